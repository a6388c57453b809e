//! Per-chain RPC transport selection for the wallet connector layer.
//!
//! Pure construction: given target chains and the provider API keys the
//! application holds, build an ordered fallback list of transports per chain.
//! Authenticated provider endpoints come first, in a fixed preference order,
//! and every chain ends with the unauthenticated public transport.

use std::collections::BTreeMap;

use serde::Deserialize;
use strum::Display;

/// Authenticated RPC providers, in fallback preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RpcProvider {
    /// Alchemy (preferred).
    Alchemy,
    /// Infura.
    Infura,
}

/// Preference order applied when several providers are configured.
const PROVIDER_ORDER: [RpcProvider; 2] = [RpcProvider::Alchemy, RpcProvider::Infura];

/// API keys for authenticated RPC providers. All optional; a chain with no
/// usable key still gets the public transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderKeys {
    /// Alchemy API key.
    #[serde(default)]
    pub alchemy: Option<String>,
    /// Infura API key.
    #[serde(default)]
    pub infura: Option<String>,
}

impl ProviderKeys {
    const fn key_for(&self, provider: RpcProvider) -> Option<&String> {
        match provider {
            RpcProvider::Alchemy => self.alchemy.as_ref(),
            RpcProvider::Infura => self.infura.as_ref(),
        }
    }
}

/// One entry in a chain's transport fallback list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Authenticated provider endpoint.
    Provider {
        /// Provider the endpoint belongs to.
        provider: RpcProvider,
        /// Full endpoint URL, key included.
        url: String,
    },
    /// The chain's default public endpoint, used as the final fallback.
    Public,
}

/// Base endpoint for `provider` on `chain_id`, without the API key segment.
/// Chains absent from this table only ever get the public transport.
const fn provider_base(provider: RpcProvider, chain_id: u64) -> Option<&'static str> {
    match (provider, chain_id) {
        (RpcProvider::Alchemy, 1) => Some("https://eth-mainnet.g.alchemy.com/v2"),
        (RpcProvider::Alchemy, 11_155_111) => Some("https://eth-sepolia.g.alchemy.com/v2"),
        (RpcProvider::Alchemy, 137) => Some("https://polygon-mainnet.g.alchemy.com/v2"),
        (RpcProvider::Alchemy, 8453) => Some("https://base-mainnet.g.alchemy.com/v2"),
        (RpcProvider::Alchemy, 84_532) => Some("https://base-sepolia.g.alchemy.com/v2"),
        (RpcProvider::Infura, 1) => Some("https://mainnet.infura.io/v3"),
        (RpcProvider::Infura, 11_155_111) => Some("https://sepolia.infura.io/v3"),
        (RpcProvider::Infura, 137) => Some("https://polygon-mainnet.infura.io/v3"),
        _ => None,
    }
}

/// Builds the ordered transport fallback list for a single chain.
#[must_use]
pub fn transports_for_chain(chain_id: u64, keys: &ProviderKeys) -> Vec<Transport> {
    let mut transports = Vec::with_capacity(PROVIDER_ORDER.len() + 1);
    for provider in PROVIDER_ORDER {
        if let (Some(key), Some(base)) = (keys.key_for(provider), provider_base(provider, chain_id))
        {
            transports.push(Transport::Provider {
                provider,
                url: format!("{base}/{key}"),
            });
        }
    }
    transports.push(Transport::Public);
    transports
}

/// Builds fallback lists for a set of chains, keyed by chain id.
#[must_use]
pub fn transports_for_chains(
    chain_ids: &[u64],
    keys: &ProviderKeys,
) -> BTreeMap<u64, Vec<Transport>> {
    chain_ids
        .iter()
        .map(|&chain_id| (chain_id, transports_for_chain(chain_id, keys)))
        .collect()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn both_keys() -> ProviderKeys {
        ProviderKeys {
            alchemy: Some("alch_key".to_string()),
            infura: Some("inf_key".to_string()),
        }
    }

    #[test]
    fn providers_come_in_preference_order_with_public_last() {
        let transports = transports_for_chain(1, &both_keys());
        assert_eq!(
            transports,
            vec![
                Transport::Provider {
                    provider: RpcProvider::Alchemy,
                    url: "https://eth-mainnet.g.alchemy.com/v2/alch_key".to_string(),
                },
                Transport::Provider {
                    provider: RpcProvider::Infura,
                    url: "https://mainnet.infura.io/v3/inf_key".to_string(),
                },
                Transport::Public,
            ]
        );
    }

    #[test_case(999_999, both_keys(); "unknown chain with keys")]
    #[test_case(1, ProviderKeys::default(); "known chain without keys")]
    fn fallback_only_cases(chain_id: u64, keys: ProviderKeys) {
        assert_eq!(
            transports_for_chain(chain_id, &keys),
            vec![Transport::Public]
        );
    }

    #[test]
    fn missing_provider_key_skips_that_provider() {
        let keys = ProviderKeys {
            alchemy: None,
            infura: Some("inf_key".to_string()),
        };
        let transports = transports_for_chain(1, &keys);
        assert_eq!(
            transports,
            vec![
                Transport::Provider {
                    provider: RpcProvider::Infura,
                    url: "https://mainnet.infura.io/v3/inf_key".to_string(),
                },
                Transport::Public,
            ]
        );
    }

    #[test]
    fn base_only_has_an_alchemy_entry() {
        // Base is not in the Infura table, so an Infura key alone changes
        // nothing for it.
        let keys = ProviderKeys {
            alchemy: None,
            infura: Some("inf_key".to_string()),
        };
        assert_eq!(transports_for_chain(8453, &keys), vec![Transport::Public]);
    }

    #[test]
    fn chain_map_covers_every_requested_chain() {
        let map = transports_for_chains(&[1, 8453, 42], &both_keys());
        assert_eq!(map.len(), 3);
        assert_eq!(map[&42], vec![Transport::Public]);
        assert_eq!(map[&1].len(), 3);
    }
}
