use std::{
    fmt::Debug,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use fs_err::File;
use serde::{Deserialize, Serialize};

/// Writes `value` as indented JSON, followed by a newline.
pub fn write_json_pretty<P: Into<PathBuf>, T: Serialize>(path: P, value: &T) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn read_toml<P: Into<PathBuf> + Debug, T: for<'de> Deserialize<'de>>(
    path: P,
) -> anyhow::Result<T> {
    let path = path.into();
    (|| toml::from_str(&fs_err::read_to_string(&path)?).map_err(anyhow::Error::new))().with_context(
        || {
            format!(
                "While trying to parse {path:?} as {}",
                std::any::type_name::<T>()
            )
        },
    )
}

/// Serializes `value` as TOML, creating the parent directory if necessary.
pub fn write_toml<P: Into<PathBuf>, T: Serialize>(path: P, value: &T) -> anyhow::Result<()> {
    let path = path.into();
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(&path, toml::to_string_pretty(value)?)?;
    Ok(())
}
