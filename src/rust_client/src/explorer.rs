use std::fmt;

const URL_MAINNET: &str = "https://api.mainnet-beta.solana.com";
const URL_TESTNET: &str = "https://api.testnet.solana.com";
const URL_DEVNET: &str = "https://api.devnet.solana.com";
const URL_LOCAL: &str = "http://127.0.0.1:8899";

const EXPLORER_URL: &str = "https://explorer.solana.com";
const LOCALNET_EXPLORER_RPC: &str = "http://localhost:8899";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Cluster {
    MainnetBeta,
    Testnet,
    Devnet,
    Localnet,
    /// Any other RPC endpoint
    Custom(String),
}

impl Cluster {
    /// Accepts a moniker (`mainnet`, `testnet`, `devnet`, `localhost`) or an RPC URL
    pub fn parse(url_or_moniker: &str) -> Self {
        match url_or_moniker {
            "m" | "mainnet" | "mainnet-beta" | URL_MAINNET => Cluster::MainnetBeta,
            "t" | "testnet" | URL_TESTNET => Cluster::Testnet,
            "d" | "devnet" | URL_DEVNET => Cluster::Devnet,
            "l" | "localhost" | "localnet" | URL_LOCAL | LOCALNET_EXPLORER_RPC => {
                Cluster::Localnet
            }
            url => Cluster::Custom(url.to_string()),
        }
    }

    pub fn rpc_url(&self) -> &str {
        match self {
            Cluster::MainnetBeta => URL_MAINNET,
            Cluster::Testnet => URL_TESTNET,
            Cluster::Devnet => URL_DEVNET,
            Cluster::Localnet => URL_LOCAL,
            Cluster::Custom(url) => url.as_str(),
        }
    }

    fn explorer_query(&self) -> Option<String> {
        match self {
            Cluster::MainnetBeta => None,
            Cluster::Testnet => Some("cluster=testnet".to_string()),
            Cluster::Devnet => Some("cluster=devnet".to_string()),
            Cluster::Localnet => Some(format!(
                "cluster=custom&customUrl={}",
                encode_query_value(LOCALNET_EXPLORER_RPC)
            )),
            Cluster::Custom(url) => Some(format!(
                "cluster=custom&customUrl={}",
                encode_query_value(url)
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkKind {
    Address,
    Transaction,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkKind::Address => "address",
            LinkKind::Transaction => "tx",
        })
    }
}

/// Form-encode a query value the way browsers' `URLSearchParams` do
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

pub fn explorer_link(kind: LinkKind, id: &str, cluster: &Cluster) -> String {
    let base = format!("{}/{}/{}", EXPLORER_URL, kind, id);
    match cluster.explorer_query() {
        Some(query) => format!("{}?{}", base, query),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_monikers() {
        assert_eq!(Cluster::parse("devnet"), Cluster::Devnet);
        assert_eq!(Cluster::parse("localhost").rpc_url(), URL_LOCAL);
        assert_eq!(Cluster::parse(URL_MAINNET), Cluster::MainnetBeta);
        assert_eq!(
            Cluster::parse("https://rpc.example.com"),
            Cluster::Custom("https://rpc.example.com".to_string())
        );
    }

    #[test]
    fn mainnet_links_have_no_query() {
        assert_eq!(
            explorer_link(LinkKind::Address, "abc", &Cluster::MainnetBeta),
            "https://explorer.solana.com/address/abc"
        );
    }

    #[test]
    fn cluster_links() {
        assert_eq!(
            explorer_link(LinkKind::Transaction, "sig", &Cluster::Devnet),
            "https://explorer.solana.com/tx/sig?cluster=devnet"
        );
        assert_eq!(
            explorer_link(LinkKind::Address, "42", &Cluster::Localnet),
            "https://explorer.solana.com/address/42?cluster=custom&customUrl=http%3A%2F%2Flocalhost%3A8899"
        );
    }
}
