use crate::error::Result;

use std::io::{BufRead, Write};

/// Interactive loop: pick the experiment, enter a trial count, repeat.
///
/// `run` is called with the trial count; an error it returns is printed and
/// the menu is shown again. End of input behaves like `0`.
pub fn menu<R, W, F>(mut input: R, out: &mut W, mut run: F) -> Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(usize, &mut W) -> Result<()>,
{
    loop {
        writeln!(out)?;
        writeln!(out, " HE noise budget experiments:")?;
        writeln!(out)?;
        writeln!(out, "  1. Observed Noise Test")?;
        writeln!(out, "  0. Exit")?;
        writeln!(out)?;
        write!(out, "Run example: ")?;
        out.flush()?;

        let selection = match read_line(&mut input)? {
            Some(line) => line,
            None => return Ok(()),
        };

        match selection.parse::<i64>() {
            Ok(0) => return Ok(()),
            Ok(1) => {
                write!(out, "Trials: ")?;
                out.flush()?;
                let trials = match read_line(&mut input)? {
                    Some(line) => line,
                    None => return Ok(()),
                };
                match trials.parse::<usize>() {
                    Ok(trials) if trials >= 1 => {
                        if let Err(e) = run(trials, out) {
                            writeln!(out, "Error: {}", e)?;
                        }
                    }
                    _ => writeln!(out, "Invalid option.")?,
                }
            }
            _ => writeln!(out, "Invalid option.")?,
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Cursor;

    fn drive(input: &str) -> (String, Vec<usize>) {
        let mut out = Vec::new();
        let mut runs = Vec::new();
        menu(Cursor::new(input), &mut out, |trials, out| {
            runs.push(trials);
            if trials == 13 {
                return Err(Error::InvalidParameters("unlucky".into()));
            }
            writeln!(out, "ran {}", trials)?;
            Ok(())
        })
        .unwrap();
        (String::from_utf8(out).unwrap(), runs)
    }

    #[test]
    fn test_runs_then_exits() {
        let (text, runs) = drive("1\n5\n0\n");
        assert_eq!(runs, vec![5]);
        assert!(text.contains("  1. Observed Noise Test"));
        assert!(text.contains("Trials: ran 5\n"));
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let (text, runs) = drive("x\n7\n1\n0\n1\nabc\n");
        assert!(runs.is_empty());
        assert_eq!(text.matches("Invalid option.").count(), 4);
    }

    #[test]
    fn test_failed_run_returns_to_menu() {
        let (text, runs) = drive("1\n13\n1\n2\n");
        assert_eq!(runs, vec![13, 2]);
        assert!(text.contains("Error: Invalid parameters: unlucky"));
        assert!(text.contains("ran 2"));
    }
}
