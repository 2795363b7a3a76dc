//! # Taxonomy
//!
//! The closed vocabularies shared by grants, opportunities, and builder
//! profiles. Every enum has a kebab-case wire name (used in JSON, query
//! strings, and the CLI) and a human-readable label.
//!
//! Parsing is forgiving about case and accepts `_` in place of `-`, so
//! `?type=travel_grant` and `?type=Travel-Grant` both resolve. JSON bodies
//! go through the same parser; serialization always emits the wire name.

use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Declares a fieldless enum together with its wire name, display label,
/// `ALL` listing, `Display`, `FromStr`, and a `Deserialize` that defers
/// to `FromStr`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => ($wire:literal, $label:literal),
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Kebab-case wire name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }

            /// Human-readable label.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CatalogError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_ascii_lowercase().replace('_', "-");
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == needle)
                    .ok_or_else(|| CatalogError::UnknownValue {
                        kind: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

wire_enum! {
    /// Blockchain ecosystem a grant or opportunity belongs to.
    pub enum Ecosystem {
        Ethereum => ("ethereum", "Ethereum"),
        Avalanche => ("avalanche", "Avalanche"),
        Solana => ("solana", "Solana"),
        Polkadot => ("polkadot", "Polkadot"),
        Polygon => ("polygon", "Polygon"),
        Arbitrum => ("arbitrum", "Arbitrum"),
        Optimism => ("optimism", "Optimism"),
        Base => ("base", "Base"),
        Celo => ("celo", "Celo"),
        Near => ("near", "NEAR"),
        Cosmos => ("cosmos", "Cosmos"),
        Starknet => ("starknet", "Starknet"),
        /// Catch-all for multi-chain or ecosystem-agnostic programs.
        Other => ("other", "Other"),
    }
}

wire_enum! {
    /// Focus area of a builder or a grant.
    pub enum BuilderNiche {
        Defi => ("defi", "DeFi"),
        Fintech => ("fintech", "Fintech"),
        Gaming => ("gaming", "Gaming"),
        Infra => ("infra", "Infra / Tooling"),
        AiCrypto => ("ai-crypto", "AI + Crypto"),
        Social => ("social", "Social"),
        PublicGoods => ("public-goods", "Public Goods"),
        Enterprise => ("enterprise", "RWA / Enterprise"),
        Nft => ("nft", "NFT"),
        DaoTooling => ("dao-tooling", "DAO Tooling"),
    }
}

wire_enum! {
    /// Whether a grant is currently accepting applications.
    pub enum GrantStatus {
        Open => ("open", "Open"),
        Upcoming => ("upcoming", "Upcoming"),
        Closed => ("closed", "Closed"),
    }
}

wire_enum! {
    /// Funding vehicle of a grant program.
    pub enum GrantType {
        Microgrant => ("microgrant", "Microgrant"),
        DevGrant => ("dev-grant", "Developer Grant"),
        DaoFunding => ("dao-funding", "DAO Funding"),
        Accelerator => ("accelerator", "Accelerator"),
        Research => ("research", "Research"),
        Community => ("community", "Community"),
    }
}

wire_enum! {
    /// How far along a builder's project is.
    pub enum ProjectMaturity {
        Idea => ("idea", "Idea Stage"),
        Mvp => ("mvp", "MVP"),
        Live => ("live", "Live Product"),
        Scaling => ("scaling", "Scaling"),
    }
}

wire_enum! {
    /// How a builder describes their own position.
    pub enum BuilderRole {
        SoloDev => ("solo-dev", "Solo Developer"),
        Founder => ("founder", "Founder"),
        DaoMember => ("dao-member", "DAO Member"),
        Team => ("team", "Team Member"),
    }
}

wire_enum! {
    /// Kind of builder opportunity listed alongside grants.
    pub enum OpportunityType {
        Grant => ("grant", "Grant"),
        TravelGrant => ("travel-grant", "Travel Grant"),
        Hackathon => ("hackathon", "Hackathon"),
        Conference => ("conference", "Conference"),
        PopUpCity => ("pop-up-city", "Pop-up City"),
        Incubator => ("incubator", "Incubator"),
        Accelerator => ("accelerator", "Accelerator"),
        Fellowship => ("fellowship", "Fellowship"),
    }
}

/// Parses a comma-separated list (`"ethereum,solana"`) into enum values.
///
/// Empty segments are skipped, so `""` and `"ethereum,"` are fine. The
/// first unknown value aborts the parse.
pub fn parse_list<T>(raw: &str) -> Result<Vec<T>, CatalogError>
where
    T: std::str::FromStr<Err = CatalogError>,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
