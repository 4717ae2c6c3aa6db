//! Configuration for the distribution and settlement engine.

use grove_common::{
    config::{
        DEFAULT_FARMER_SHARE_PERCENT, DEFAULT_FEE_ACCOUNT, DEFAULT_MARKETPLACE_FEE_BPS,
        DEFAULT_PAYMENT_ASSET, DEFAULT_PAYOUT_BATCH_SIZE, DEFAULT_RESERVE_ACCOUNT,
        MAX_FEE_BPS, MAX_LISTING_DURATION_DAYS, MIN_LISTING_DURATION_DAYS, PERCENT_DENOMINATOR,
    },
    types::AccountId,
};
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

/// What happens to the integer remainder of a distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DustPolicy {
    /// Leave the dust in the revenue reserve, tracked per grove.
    #[default]
    Retain,
    /// Credit the dust to the grove farmer together with the farmer share.
    ToFarmer,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("farmer share must be between 0 and {max} percent, got {value}")]
    FarmerShare { value: u8, max: u64 },
    #[error("marketplace fee must be at most {max} bps, got {value}")]
    MarketplaceFee { value: u16, max: u16 },
    #[error("payout batch size must be positive")]
    PayoutBatchSize,
    #[error("max listing duration must be between {min} and {max} days, got {value}")]
    ListingDuration { value: u32, min: u32, max: u32 },
    #[error("{0} account must not be empty")]
    EmptyAccount(&'static str),
    #[error("payment asset must not be empty")]
    EmptyPaymentAsset,
}

const fn default_farmer_share_percent() -> u8 {
    DEFAULT_FARMER_SHARE_PERCENT
}

const fn default_marketplace_fee_bps() -> u16 {
    DEFAULT_MARKETPLACE_FEE_BPS
}

const fn default_payout_batch_size() -> usize {
    DEFAULT_PAYOUT_BATCH_SIZE
}

const fn default_max_listing_duration_days() -> u32 {
    MAX_LISTING_DURATION_DAYS
}

const fn default_auto_payout_farmer_share() -> bool {
    true
}

fn default_fee_account() -> AccountId {
    AccountId::from(DEFAULT_FEE_ACCOUNT)
}

fn default_reserve_account() -> AccountId {
    AccountId::from(DEFAULT_RESERVE_ACCOUNT)
}

fn default_payment_asset() -> String {
    DEFAULT_PAYMENT_ASSET.to_string()
}

/// Policy values of the engine.
#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Percent of each harvest deposit credited to the farmer.
    ///
    /// The investor pool is the remainder, so both always add up to the deposit.
    #[clap(name = "farmer-share-percent", long, default_value_t = default_farmer_share_percent())]
    #[serde(default = "default_farmer_share_percent")]
    pub farmer_share_percent: u8,

    /// Marketplace fee in basis points, charged to the buyer side of every trade.
    #[clap(name = "marketplace-fee-bps", long, default_value_t = default_marketplace_fee_bps())]
    #[serde(default = "default_marketplace_fee_bps")]
    pub marketplace_fee_bps: u16,

    /// Disposition of distribution dust.
    #[clap(name = "dust-policy", long, value_enum, default_value_t = DustPolicy::Retain)]
    #[serde(default)]
    pub dust_policy: DustPolicy,

    /// Account receiving marketplace fees.
    #[clap(name = "fee-account", long, default_value = DEFAULT_FEE_ACCOUNT)]
    #[serde(default = "default_fee_account")]
    pub fee_account: AccountId,

    /// Account holding deposited revenue until it is paid out.
    #[clap(name = "reserve-account", long, default_value = DEFAULT_RESERVE_ACCOUNT)]
    #[serde(default = "default_reserve_account")]
    pub reserve_account: AccountId,

    /// Payment asset used for payouts and trade settlement.
    #[clap(name = "payment-asset", long, default_value = DEFAULT_PAYMENT_ASSET)]
    #[serde(default = "default_payment_asset")]
    pub payment_asset: String,

    /// Accounts allowed to deposit and distribute for any grove and to pause the engine.
    #[clap(name = "admin", long, value_delimiter = ',')]
    #[serde(default)]
    pub admins: Vec<AccountId>,

    /// Pay the farmer share out as soon as a distribution is committed.
    ///
    /// When disabled the farmer share accumulates and is withdrawn explicitly.
    #[clap(
        name = "auto-payout-farmer-share",
        long,
        default_value_t = default_auto_payout_farmer_share(),
        action = clap::ArgAction::Set
    )]
    #[serde(default = "default_auto_payout_farmer_share")]
    pub auto_payout_farmer_share: bool,

    /// Payout requests emitted concurrently per batch.
    #[clap(name = "payout-batch-size", long, default_value_t = default_payout_batch_size())]
    #[serde(default = "default_payout_batch_size")]
    pub payout_batch_size: usize,

    /// Longest listing duration accepted, in days.
    #[clap(name = "max-listing-duration-days", long, default_value_t = default_max_listing_duration_days())]
    #[serde(default = "default_max_listing_duration_days")]
    pub max_listing_duration_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            farmer_share_percent: DEFAULT_FARMER_SHARE_PERCENT,
            marketplace_fee_bps: DEFAULT_MARKETPLACE_FEE_BPS,
            dust_policy: DustPolicy::Retain,
            fee_account: default_fee_account(),
            reserve_account: default_reserve_account(),
            payment_asset: default_payment_asset(),
            admins: Vec::new(),
            auto_payout_farmer_share: true,
            payout_batch_size: DEFAULT_PAYOUT_BATCH_SIZE,
            max_listing_duration_days: MAX_LISTING_DURATION_DAYS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.farmer_share_percent as u64 > PERCENT_DENOMINATOR {
            return Err(ConfigError::FarmerShare {
                value: self.farmer_share_percent,
                max: PERCENT_DENOMINATOR,
            });
        }
        if self.marketplace_fee_bps > MAX_FEE_BPS {
            return Err(ConfigError::MarketplaceFee {
                value: self.marketplace_fee_bps,
                max: MAX_FEE_BPS,
            });
        }
        if self.payout_batch_size == 0 {
            return Err(ConfigError::PayoutBatchSize);
        }
        if !(MIN_LISTING_DURATION_DAYS..=MAX_LISTING_DURATION_DAYS)
            .contains(&self.max_listing_duration_days)
        {
            return Err(ConfigError::ListingDuration {
                value: self.max_listing_duration_days,
                min: MIN_LISTING_DURATION_DAYS,
                max: MAX_LISTING_DURATION_DAYS,
            });
        }
        if self.fee_account.as_str().is_empty() {
            return Err(ConfigError::EmptyAccount("fee"));
        }
        if self.reserve_account.as_str().is_empty() {
            return Err(ConfigError::EmptyAccount("reserve"));
        }
        if self.payment_asset.is_empty() {
            return Err(ConfigError::EmptyPaymentAsset);
        }
        Ok(())
    }

    pub fn is_admin(&self, account: &AccountId) -> bool {
        self.admins.iter().any(|admin| admin == account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        engine: EngineConfig,
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();

        assert_eq!(config.farmer_share_percent, 30);
        assert_eq!(config.marketplace_fee_bps, 250);
        assert_eq!(config.dust_policy, DustPolicy::Retain);
        assert_eq!(config.fee_account.as_str(), DEFAULT_FEE_ACCOUNT);
        assert!(config.admins.is_empty());
        assert!(config.auto_payout_farmer_share);
        assert_eq!(config.payout_batch_size, 25);
        assert_eq!(config.max_listing_duration_days, 365);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_defaults_match_default() {
        let cli = TestCli::parse_from(["grove"]);
        let default = EngineConfig::default();
        assert_eq!(cli.engine.farmer_share_percent, default.farmer_share_percent);
        assert_eq!(cli.engine.marketplace_fee_bps, default.marketplace_fee_bps);
        assert_eq!(cli.engine.reserve_account, default.reserve_account);
        assert_eq!(cli.engine.payment_asset, default.payment_asset);
        assert!(cli.engine.auto_payout_farmer_share);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = TestCli::parse_from([
            "grove",
            "--farmer-share-percent",
            "20",
            "--dust-policy",
            "to-farmer",
            "--admin",
            "ops,treasury",
            "--auto-payout-farmer-share",
            "false",
        ]);
        assert_eq!(cli.engine.farmer_share_percent, 20);
        assert_eq!(cli.engine.dust_policy, DustPolicy::ToFarmer);
        assert_eq!(
            cli.engine.admins,
            vec![AccountId::from("ops"), AccountId::from("treasury")]
        );
        assert!(!cli.engine.auto_payout_farmer_share);
        assert!(cli.engine.is_admin(&AccountId::from("ops")));
    }

    #[test]
    fn test_json_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config: EngineConfig = serde_json::from_str(r#"{"marketplace_fee_bps": 100}"#)?;
        assert_eq!(config.marketplace_fee_bps, 100);
        assert_eq!(config.farmer_share_percent, DEFAULT_FARMER_SHARE_PERCENT);
        assert_eq!(config.payout_batch_size, DEFAULT_PAYOUT_BATCH_SIZE);
        assert!(config.auto_payout_farmer_share);
        Ok(())
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = EngineConfig::default();
        config.farmer_share_percent = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FarmerShare { value: 101, .. })
        ));

        let mut config = EngineConfig::default();
        config.marketplace_fee_bps = MAX_FEE_BPS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MarketplaceFee { .. })
        ));

        let mut config = EngineConfig::default();
        config.payout_batch_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::PayoutBatchSize));

        let mut config = EngineConfig::default();
        config.max_listing_duration_days = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ListingDuration { .. })
        ));

        let mut config = EngineConfig::default();
        config.payment_asset = String::new();
        assert_eq!(config.validate(), Err(ConfigError::EmptyPaymentAsset));
    }
}
