use crate::backend::Capabilities;
use crate::error::{Error, Result};

use std::collections::HashSet;

/*
    Built-in operation chains:
        basic: fresh, add, multiply, modulus switch
        deep:  fresh, three levels of a multiplication tree over 8 inputs
*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainKind {
    Basic,
    Deep,
}

impl std::fmt::Display for ChainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainKind::Basic => write!(f, "basic"),
            ChainKind::Deep => write!(f, "deep"),
        }
    }
}

impl std::str::FromStr for ChainKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "basic" | "clp20" => Ok(ChainKind::Basic),
            "deep" | "tree" => Ok(ChainKind::Deep),
            other => Err(Error::UnknownChain(other.to_string())),
        }
    }
}

impl ChainKind {
    /// Fails when a backend with `caps` cannot evaluate the chain at all.
    pub fn check_supported(&self, caps: &Capabilities) -> Result<()> {
        if *self == ChainKind::Deep && !caps.repeated_multiply {
            return Err(Error::InvalidParameters(
                "the deep chain multiplies products, which needs a relinearization key \
                 (at least two coefficient moduli, n >= 4096)"
                    .into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Encrypt the trial input with the given index
    Encrypt { input: usize },
    Add,
    Multiply,
    Relinearize,
    ModSwitch,
}

impl Op {
    pub fn arity(&self) -> usize {
        match self {
            Self::Encrypt { .. } => 0,
            Self::Relinearize | Self::ModSwitch => 1,
            Self::Add | Self::Multiply => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Encrypt { .. } => "encrypt",
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::Relinearize => "relinearize",
            Self::ModSwitch => "mod switch",
        }
    }
}

/// Size or budget restoring operation applied after a node's probe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Relinearize,
    ModSwitch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Probe {
    pub label: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub op: Op,
    pub inputs: Vec<String>,
    pub output: String,
    pub probe: Option<Probe>,
    pub reduce: Option<Reduction>,
}

impl Node {
    pub fn encrypt(input: usize, output: &str) -> Node {
        Node::new(Op::Encrypt { input }, &[], output)
    }

    pub fn unary(op: Op, a: &str, output: &str) -> Node {
        Node::new(op, &[a], output)
    }

    pub fn binary(op: Op, a: &str, b: &str, output: &str) -> Node {
        Node::new(op, &[a, b], output)
    }

    fn new(op: Op, inputs: &[&str], output: &str) -> Node {
        Node {
            op,
            inputs: inputs.iter().map(|x| x.to_string()).collect(),
            output: output.to_string(),
            probe: None,
            reduce: None,
        }
    }

    pub fn probe(mut self, label: &str, title: &str) -> Node {
        self.probe = Some(Probe {
            label: label.to_string(),
            title: title.to_string(),
        });
        self
    }

    pub fn reduce_if(mut self, condition: bool, reduction: Reduction) -> Node {
        if condition {
            self.reduce = Some(reduction);
        }
        self
    }
}

/// A fixed sequence of homomorphic operations, executed identically on
/// every trial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    pub kind: ChainKind,
    /// Number of clear inputs per trial
    pub inputs: usize,
    /// Trial `i` encrypts `i + input_offset`, `i + input_offset + 1`, ...
    pub input_offset: u64,
    pub nodes: Vec<Node>,
}

impl Chain {
    pub fn for_kind(kind: ChainKind, caps: &Capabilities) -> Chain {
        match kind {
            ChainKind::Basic => Chain::basic(caps),
            ChainKind::Deep => Chain::deep(caps),
        }
    }

    /// `(x0 + x1) * x1`, then a modulus switch when the parameters allow one.
    pub fn basic(caps: &Capabilities) -> Chain {
        let mut nodes = vec![
            Node::encrypt(0, "x0").probe("fresh", "fresh encryption"),
            Node::encrypt(1, "x1"),
            Node::binary(Op::Add, "x0", "x1", "sum").probe("add", "addition"),
            Node::binary(Op::Multiply, "sum", "x1", "prod").probe("mult", "multiplication"),
        ];
        if caps.mod_switch {
            nodes.push(
                Node::unary(Op::ModSwitch, "prod", "prod").probe("modswitch", "modulus switching"),
            );
        }

        Chain {
            kind: ChainKind::Basic,
            inputs: 2,
            input_offset: 0,
            nodes,
        }
    }

    /// Pairwise products of 8 inputs down to one, each intermediate product
    /// relinearized when the backend needs it.
    pub fn deep(caps: &Capabilities) -> Chain {
        let mut nodes: Vec<Node> = (0..8)
            .map(|i| Node::encrypt(i, &format!("x{}", i)))
            .collect();
        nodes[0] = nodes[0].clone().probe("fresh", "fresh encryption");

        let levels = [
            ("mult1", "first multiplication"),
            ("mult2", "second multiplication"),
            ("mult3", "third multiplication"),
        ];
        let mut operands: Vec<String> = (0..8).map(|i| format!("x{}", i)).collect();
        for (depth, (label, title)) in levels.iter().enumerate() {
            let last = depth == levels.len() - 1;
            let mut products = Vec::with_capacity(operands.len() / 2);
            for (j, pair) in operands.chunks(2).enumerate() {
                let output = format!("p{}{}", depth + 1, j);
                let mut node = Node::binary(Op::Multiply, &pair[0], &pair[1], &output)
                    .reduce_if(caps.relinearize && !last, Reduction::Relinearize);
                if j == 0 {
                    node = node.probe(label, title);
                }
                nodes.push(node);
                products.push(output);
            }
            operands = products;
        }

        Chain {
            kind: ChainKind::Deep,
            inputs: 8,
            input_offset: 1,
            nodes,
        }
    }

    pub fn probes(&self) -> impl Iterator<Item = &Probe> {
        self.nodes.iter().filter_map(|n| n.probe.as_ref())
    }

    /// Clear inputs of trial `trial`, reduced into the plaintext space.
    pub fn inputs_for_trial(&self, trial: usize, modulus: u64) -> Vec<u64> {
        (0..self.inputs as u64)
            .map(|k| (trial as u64 + self.input_offset + k) % modulus)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut defined: HashSet<&str> = HashSet::new();
        let mut labels: HashSet<&str> = HashSet::new();

        for (i, node) in self.nodes.iter().enumerate() {
            if node.inputs.len() != node.op.arity() {
                return Err(Error::MalformedChain(format!(
                    "node {} ({}) takes {} inputs, got {}",
                    i,
                    node.op.name(),
                    node.op.arity(),
                    node.inputs.len()
                )));
            }
            if let Op::Encrypt { input } = node.op {
                if input >= self.inputs {
                    return Err(Error::MalformedChain(format!(
                        "node {} encrypts input {} of {}",
                        i, input, self.inputs
                    )));
                }
            }
            if let Some(missing) = node.inputs.iter().find(|x| !defined.contains(x.as_str())) {
                return Err(Error::MalformedChain(format!(
                    "node {} reads {} before it is defined",
                    i, missing
                )));
            }
            if let Some(probe) = &node.probe {
                if !labels.insert(probe.label.as_str()) {
                    return Err(Error::MalformedChain(format!(
                        "probe label {} used twice",
                        probe.label
                    )));
                }
            }
            defined.insert(node.output.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(relinearize: bool, mod_switch: bool) -> Capabilities {
        Capabilities {
            relinearize,
            repeated_multiply: relinearize,
            mod_switch,
            estimated_budget: false,
            exact_arithmetic: true,
        }
    }

    #[test]
    fn test_basic_chain_probes() {
        let chain = Chain::basic(&caps(true, true));
        chain.validate().unwrap();
        let labels: Vec<&str> = chain.probes().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["fresh", "add", "mult", "modswitch"]);
        assert!(chain.nodes.iter().all(|n| n.reduce.is_none()));
    }

    #[test]
    fn test_deep_chain_needs_repeated_multiply() {
        assert!(matches!(
            ChainKind::Deep.check_supported(&caps(false, false)),
            Err(Error::InvalidParameters(_))
        ));
        ChainKind::Deep.check_supported(&caps(true, true)).unwrap();
        ChainKind::Basic.check_supported(&caps(false, false)).unwrap();
    }

    #[test]
    fn test_basic_chain_without_mod_switch() {
        let chain = Chain::basic(&caps(true, false));
        chain.validate().unwrap();
        assert_eq!(chain.probes().count(), 3);
        assert!(chain.nodes.iter().all(|n| n.op != Op::ModSwitch));
    }

    #[test]
    fn test_deep_chain_tree() {
        let chain = Chain::deep(&caps(true, false));
        chain.validate().unwrap();
        let labels: Vec<&str> = chain.probes().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["fresh", "mult1", "mult2", "mult3"]);

        let products: Vec<&Node> = chain
            .nodes
            .iter()
            .filter(|n| n.op == Op::Multiply)
            .collect();
        assert_eq!(products.len(), 7);
        // every product except the root is relinearized
        assert_eq!(
            products
                .iter()
                .filter(|n| n.reduce == Some(Reduction::Relinearize))
                .count(),
            6
        );
        assert_eq!(products[6].inputs, vec!["p20", "p21"]);
    }

    #[test]
    fn test_deep_chain_without_relinearization() {
        let chain = Chain::deep(&caps(false, false));
        assert!(chain.nodes.iter().all(|n| n.reduce.is_none()));
    }

    #[test]
    fn test_trial_inputs() {
        let basic = Chain::basic(&caps(true, true));
        assert_eq!(basic.inputs_for_trial(0, 257), vec![0, 1]);
        assert_eq!(basic.inputs_for_trial(256, 257), vec![256, 0]);
        let deep = Chain::deep(&caps(true, true));
        assert_eq!(deep.inputs_for_trial(2, 65537), (3..=10).collect::<Vec<u64>>());
    }

    #[test]
    fn test_validate_rejects_malformed_chains() {
        let mut chain = Chain::basic(&caps(true, true));
        chain.nodes.swap(0, 2);
        assert!(chain.validate().is_err());

        let mut chain = Chain::basic(&caps(true, true));
        chain.nodes[1] = Node::encrypt(5, "x1");
        assert!(chain.validate().is_err());

        let mut chain = Chain::basic(&caps(true, true));
        chain.nodes[1] = Node::encrypt(1, "x1").probe("fresh", "again");
        assert!(chain.validate().is_err());

        let mut chain = Chain::basic(&caps(true, true));
        chain.nodes[2].inputs.pop();
        assert!(chain.validate().is_err());
    }

    #[test]
    fn test_chain_kind_parse() {
        assert_eq!("basic".parse::<ChainKind>().unwrap(), ChainKind::Basic);
        assert_eq!("Deep".parse::<ChainKind>().unwrap(), ChainKind::Deep);
        assert!("wide".parse::<ChainKind>().is_err());
    }
}
