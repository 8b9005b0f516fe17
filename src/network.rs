use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Chain identity half of the (address, network) token key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    Eth,
    Bsc,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Eth => "ETH",
            Network::Bsc => "BSC",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ETH" => Ok(Network::Eth),
            "BSC" => Ok(Network::Bsc),
            other => Err(anyhow::anyhow!(
                "unknown network '{other}', expected ETH or BSC"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("eth".parse::<Network>().unwrap(), Network::Eth);
        assert_eq!("BSC".parse::<Network>().unwrap(), Network::Bsc);
    }

    #[test]
    fn round_trips_through_display() {
        for network in [Network::Eth, Network::Bsc] {
            assert_eq!(network.to_string().parse::<Network>().unwrap(), network);
        }
    }

    #[test]
    fn rejects_unknown_networks() {
        assert!("MATIC".parse::<Network>().is_err());
    }
}
