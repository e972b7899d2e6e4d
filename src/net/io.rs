//! I/O 支持：JSON 与 RON 序列化接口，网文件按扩展名选择格式。
use std::fs;
use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::core::{Net, NetError};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron syntax error: {0}")]
    RonSyntax(#[from] ron::error::SpannedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid net: {0}")]
    Net(#[from] NetError),
    #[error("unsupported file extension for {0}")]
    UnsupportedFormat(String),
}

pub fn to_json_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    fs::write(path, to_json_string(value)?)?;
    Ok(())
}

pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    from_json_str(&fs::read_to_string(path)?)
}

pub fn to_ron_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    let pretty = PrettyConfig::default().new_line("\n".to_owned());
    Ok(ron::ser::to_string_pretty(value, pretty)?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s)?)
}

pub fn write_ron<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    fs::write(path, to_ron_string(value)?)?;
    Ok(())
}

pub fn read_ron<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    from_ron_str(&fs::read_to_string(path)?)
}

/// `.json` 或 `.ron`，其余扩展名报错。
pub fn read_by_extension<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => read_json(path),
        Some("ron") => read_ron(path),
        _ => Err(IoError::UnsupportedFormat(path.display().to_string())),
    }
}

/// 读取并校验一张网。
pub fn load_net<P: AsRef<Path>>(path: P) -> Result<Net, IoError> {
    let net: Net = read_by_extension(path)?;
    net.validate()?;
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::structure::{Place, Transition};

    fn sample() -> Net {
        let mut net = Net::empty();
        let p = net.add_place(Place::new_with_tokens("p", 1));
        let t = net.add_transition(Transition::new("t"));
        net.add_input_arc(p, t, 1).unwrap();
        net.add_output_arc(p, t, 2).unwrap();
        net
    }

    #[test]
    fn net_survives_json_and_ron() {
        let net = sample();
        let json: Net = from_json_str(&to_json_string(&net).unwrap()).unwrap();
        assert_eq!(json.c_matrix(), net.c_matrix());
        let ron: Net = from_ron_str(&to_ron_string(&net).unwrap()).unwrap();
        assert_eq!(ron.places, net.places);
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(matches!(
            from_ron_str::<Net>("(places: ["),
            Err(IoError::RonSyntax(_))
        ));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            load_net("net.xml"),
            Err(IoError::UnsupportedFormat(_))
        ));
    }
}
