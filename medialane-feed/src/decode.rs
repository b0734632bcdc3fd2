//! Turns raw Starknet events of Medialane contracts into feed activities.

use std::{
    collections::HashMap,
    io::{Error, ErrorKind, Result},
};

use crate::{
    activity::{Activity, ActivityKind},
    api::EmittedEvent,
    felt,
};

pub const TRANSFER: &str = "Transfer";
pub const ORDER_CREATED: &str = "OrderCreated";
pub const ORDER_FULFILLED: &str = "OrderFulfilled";
pub const ORDER_CANCELLED: &str = "OrderCancelled";

/// `OrderCreated` side flag for a listing; `1` is an offer.
const SIDE_LISTING: u128 = 0;
const SIDE_OFFER: u128 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selectors {
    pub transfer: String,
    pub order_created: String,
    pub order_fulfilled: String,
    pub order_cancelled: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            transfer: felt::starknet_keccak(TRANSFER.as_bytes()),
            order_created: felt::starknet_keccak(ORDER_CREATED.as_bytes()),
            order_fulfilled: felt::starknet_keccak(ORDER_FULFILLED.as_bytes()),
            order_cancelled: felt::starknet_keccak(ORDER_CANCELLED.as_bytes()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Decoder {
    selectors: Selectors,
    /// Normalized collection address -> display label.
    labels: HashMap<String, String>,
}

impl Decoder {
    pub fn new<I>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut normalized = HashMap::new();
        for (address, label) in labels {
            normalized.insert(felt::normalize(&address)?, label);
        }
        Ok(Self {
            selectors: Selectors::default(),
            labels: normalized,
        })
    }

    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    /// Display label of a collection, the shortened address when unknown.
    pub fn label(&self, contract: &str) -> String {
        felt::normalize(contract)
            .ok()
            .and_then(|address| self.labels.get(&address).cloned())
            .unwrap_or_else(|| felt::short(contract))
    }

    /// Decodes one event. `index` is the position of the event inside its
    /// transaction. Returns `Ok(None)` for events the feed does not show.
    pub fn decode(
        &self,
        event: &EmittedEvent,
        index: usize,
        timestamp: u64,
    ) -> Result<Option<Activity>> {
        let selector = match event.keys.first() {
            Some(key) => felt::normalize(key)?,
            None => return Ok(None),
        };

        let decoded = if selector == self.selectors.transfer {
            self.transfer(event)?
        } else if selector == self.selectors.order_created {
            self.order_created(event)?
        } else if selector == self.selectors.order_fulfilled {
            self.order_fulfilled(event)?
        } else if selector == self.selectors.order_cancelled {
            self.order_cancelled(event)?
        } else {
            return Ok(None);
        };

        let (kind, asset_name, user, details) = decoded;
        Ok(Some(Activity {
            id: Activity::event_id(&felt::normalize(&event.transaction_hash)?, index),
            kind,
            asset_name,
            user,
            details,
            tx_hash: felt::normalize(&event.transaction_hash)?,
            timestamp,
            block_number: event.block_number.unwrap_or_default(),
            contract: felt::normalize(&event.from_address)?,
        }))
    }

    // keys: [selector, from, to, token_id.low, token_id.high]
    fn transfer(&self, event: &EmittedEvent) -> Result<Decoded> {
        let keys = fields(&event.keys, 5, TRANSFER, "keys")?;
        let from = felt::normalize(&keys[1])?;
        let to = felt::normalize(&keys[2])?;
        let token_id = felt::u256_to_string(&keys[3], &keys[4])?;
        let asset = format!("{} #{}", self.label(&event.from_address), token_id);

        let decoded = if felt::is_zero(&from) {
            let details = format!("Minted {} to {}", asset, felt::short(&to));
            (ActivityKind::Mint, asset, to, details)
        } else if felt::is_zero(&to) {
            let details = format!("Burned {}", asset);
            (ActivityKind::Burn, asset, from, details)
        } else {
            let details = format!(
                "Transferred {} from {} to {}",
                asset,
                felt::short(&from),
                felt::short(&to)
            );
            (ActivityKind::Transfer, asset, from, details)
        };
        Ok(decoded)
    }

    // keys: [selector, order_hash, offerer]
    // data: [nft_contract, token_id.low, token_id.high, price.low, price.high, side]
    fn order_created(&self, event: &EmittedEvent) -> Result<Decoded> {
        let keys = fields(&event.keys, 3, ORDER_CREATED, "keys")?;
        let data = fields(&event.data, 6, ORDER_CREATED, "data")?;
        let offerer = felt::normalize(&keys[2])?;
        let asset = self.asset(data)?;
        let price = felt::u256_to_string(&data[3], &data[4])?;

        match felt::to_u128(&data[5])? {
            SIDE_LISTING => {
                let details = format!("Listed {} at price {}", asset, price);
                Ok((ActivityKind::Listing, asset, offerer, details))
            }
            SIDE_OFFER => {
                let details = format!("Offer on {} at price {}", asset, price);
                Ok((ActivityKind::Offer, asset, offerer, details))
            }
            side => Err(Error::new(
                ErrorKind::InvalidData,
                format!("{}: unknown order side {}", ORDER_CREATED, side),
            )),
        }
    }

    // keys: [selector, order_hash, offerer, fulfiller]
    // data: [nft_contract, token_id.low, token_id.high, price.low, price.high]
    fn order_fulfilled(&self, event: &EmittedEvent) -> Result<Decoded> {
        let keys = fields(&event.keys, 4, ORDER_FULFILLED, "keys")?;
        let data = fields(&event.data, 5, ORDER_FULFILLED, "data")?;
        let offerer = felt::normalize(&keys[2])?;
        let fulfiller = felt::normalize(&keys[3])?;
        let asset = self.asset(data)?;
        let price = felt::u256_to_string(&data[3], &data[4])?;
        let details = format!(
            "Sold {} between {} and {} at price {}",
            asset,
            felt::short(&offerer),
            felt::short(&fulfiller),
            price
        );
        Ok((ActivityKind::Sale, asset, fulfiller, details))
    }

    // keys: [selector, order_hash, offerer]
    // data: [nft_contract, token_id.low, token_id.high]
    fn order_cancelled(&self, event: &EmittedEvent) -> Result<Decoded> {
        let keys = fields(&event.keys, 3, ORDER_CANCELLED, "keys")?;
        let data = fields(&event.data, 3, ORDER_CANCELLED, "data")?;
        let order_hash = felt::normalize(&keys[1])?;
        let offerer = felt::normalize(&keys[2])?;
        let asset = self.asset(data)?;
        let details = format!(
            "Cancelled order {} for {}",
            felt::short(&order_hash),
            asset
        );
        Ok((ActivityKind::Cancel, asset, offerer, details))
    }

    fn asset(&self, data: &[String]) -> Result<String> {
        let token_id = felt::u256_to_string(&data[1], &data[2])?;
        Ok(format!("{} #{}", self.label(&data[0]), token_id))
    }
}

/// (kind, asset name, user, details)
type Decoded = (ActivityKind, String, String, String);

fn fields<'a>(values: &'a [String], want: usize, event: &str, part: &str) -> Result<&'a [String]> {
    if values.len() < want {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!(
                "{}: expected {} {}, found {}",
                event,
                want,
                part,
                values.len()
            ),
        ));
    }
    Ok(&values[..want])
}
