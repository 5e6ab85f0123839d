use crate::error::Result;

use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub fn load_serialized<T, P>(path: P) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    P: AsRef<Path>,
{
    let rdr = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(rdr)?)
}

pub fn save_serialized<T, P>(path: P, data: &T) -> Result<()>
where
    T: Serialize + DeserializeOwned,
    P: AsRef<Path>,
{
    let mut wtr = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut wtr, data)?;
    Ok(())
}
