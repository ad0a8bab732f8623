// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Transfer events and the log queries that produce them.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    rpc::types::{BlockNumberOrTag, Filter, Log},
    sol,
    sol_types::SolEvent,
};
use anyhow::Context;
use futures_util::future::try_join_all;

/// Number of blocks requested per `eth_getLogs` call.
pub const LOG_QUERY_CHUNK_SIZE: u64 = 50_000;

sol! {
    #[sol(rpc)]
    contract IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function balanceOf(address owner) external view returns (uint256);
    }
}

/// One side of a transfer.
///
/// Supply creation and destruction are modelled as [Party::SystemSupply] instead of a magic zero
/// address, so nothing downstream can accrue a score for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Party {
    SystemSupply,
    Holder(Address),
}

impl Party {
    /// Map an on-chain address to a [Party]. The zero address is the mint/burn sentinel.
    pub fn from_address(address: Address) -> Self {
        if address == Address::ZERO {
            Self::SystemSupply
        } else {
            Self::Holder(address)
        }
    }

    pub fn holder(&self) -> Option<Address> {
        match self {
            Self::SystemSupply => None,
            Self::Holder(address) => Some(*address),
        }
    }
}

impl From<Address> for Party {
    fn from(address: Address) -> Self {
        Self::from_address(address)
    }
}

/// A balance change of one tracked instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// Instrument (token contract) that emitted the transfer
    pub instrument: Address,
    pub from: Party,
    pub to: Party,
    pub amount: U256,
    pub block: u64,
}

impl TransferEvent {
    pub fn new(from: impl Into<Party>, to: impl Into<Party>, amount: U256, block: u64) -> Self {
        Self { instrument: Address::ZERO, from: from.into(), to: to.into(), amount, block }
    }

    /// Supply created for `to`.
    pub fn mint(to: Address, amount: U256, block: u64) -> Self {
        Self::new(Party::SystemSupply, to, amount, block)
    }

    /// Supply destroyed from `from`.
    pub fn burn(from: Address, amount: U256, block: u64) -> Self {
        Self::new(from, Party::SystemSupply, amount, block)
    }

    pub fn with_instrument(mut self, instrument: Address) -> Self {
        self.instrument = instrument;
        self
    }
}

/// Query logs in chunks to avoid hitting provider limits
pub async fn query_logs_chunked<P: Provider>(
    provider: &P,
    filter: Filter,
    from_block: u64,
    to_block: u64,
) -> anyhow::Result<Vec<Log>> {
    let mut all_logs = Vec::new();

    let mut current_from = from_block;
    while current_from <= to_block {
        let current_to = current_from.saturating_add(LOG_QUERY_CHUNK_SIZE - 1).min(to_block);

        let chunk_filter = filter
            .clone()
            .from_block(BlockNumberOrTag::Number(current_from))
            .to_block(BlockNumberOrTag::Number(current_to));

        let logs = provider.get_logs(&chunk_filter).await?;
        all_logs.extend(logs);

        if current_to == u64::MAX {
            break;
        }
        current_from = current_to + 1;
    }

    Ok(all_logs)
}

/// Position of a log within the chain, used to order transfers across instruments.
type LogPosition = (u64, u64, u64);

fn decode_transfer(log: &Log) -> anyhow::Result<(LogPosition, TransferEvent)> {
    let (Some(block), Some(tx_idx), Some(log_idx)) =
        (log.block_number, log.transaction_index, log.log_index)
    else {
        anyhow::bail!("Transfer log from {} is missing its block position", log.address());
    };
    let decoded = log
        .log_decode::<IERC20::Transfer>()
        .with_context(|| format!("Failed to decode Transfer log at block {block}"))?;
    let transfer = &decoded.inner.data;

    let event = TransferEvent {
        instrument: decoded.inner.address,
        from: Party::from_address(transfer.from),
        to: Party::from_address(transfer.to),
        amount: transfer.value,
        block,
    };
    Ok(((block, tx_idx, log_idx), event))
}

/// Decode raw `Transfer` logs into events ordered by block, transaction index and log index.
///
/// The ordering is taken from the log positions the ledger reports, so transfers of different
/// instruments within one block come out in execution order.
pub fn decode_transfer_logs(logs: &[Log]) -> anyhow::Result<Vec<TransferEvent>> {
    let mut positioned = logs.iter().map(decode_transfer).collect::<anyhow::Result<Vec<_>>>()?;
    positioned.sort_by_key(|(position, _)| *position);
    Ok(positioned.into_iter().map(|(_, event)| event).collect())
}

/// Fetch every `Transfer` of the given instruments between `from_block` and `to_block` inclusive.
///
/// Instruments are queried concurrently; the result is ordered by chain position.
pub async fn fetch_transfer_events<P: Provider>(
    provider: &P,
    instruments: &[Address],
    from_block: u64,
    to_block: u64,
) -> anyhow::Result<Vec<TransferEvent>> {
    if from_block > to_block {
        return Ok(Vec::new());
    }
    tracing::info!(
        "Fetching transfers of {} instruments ({} blocks)...",
        instruments.len(),
        to_block - from_block + 1
    );

    let queries = instruments.iter().map(|&instrument| async move {
        let filter =
            Filter::new().address(instrument).event_signature(IERC20::Transfer::SIGNATURE_HASH);
        query_logs_chunked(provider, filter, from_block, to_block)
            .await
            .with_context(|| format!("Failed to get transfer logs for {instrument}"))
    });
    let logs: Vec<Log> = try_join_all(queries).await?.into_iter().flatten().collect();
    tracing::debug!("Fetched {} transfer logs", logs.len());

    decode_transfer_logs(&logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, LogData};

    const TOKEN: Address = address!("0x1111111111111111111111111111111111111111");
    const ALICE: Address = address!("0x00000000000000000000000000000000000000a1");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    fn transfer_log(from: Address, to: Address, value: u64, position: LogPosition) -> Log {
        let event = IERC20::Transfer { from, to, value: U256::from(value) };
        let data: LogData = event.encode_log_data();
        Log {
            inner: alloy::primitives::Log { address: TOKEN, data },
            block_number: Some(position.0),
            transaction_index: Some(position.1),
            log_index: Some(position.2),
            ..Default::default()
        }
    }

    #[test]
    fn zero_address_is_system_supply() {
        assert_eq!(Party::from_address(Address::ZERO), Party::SystemSupply);
        assert_eq!(Party::from_address(ALICE), Party::Holder(ALICE));
        assert_eq!(Party::SystemSupply.holder(), None);
    }

    #[test]
    fn decodes_mints_and_transfers_in_chain_order() {
        let logs = vec![
            transfer_log(ALICE, BOB, 5, (20, 0, 3)),
            transfer_log(Address::ZERO, ALICE, 10, (10, 1, 0)),
            transfer_log(BOB, Address::ZERO, 2, (20, 0, 1)),
        ];

        let events = decode_transfer_logs(&logs).unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0],
            TransferEvent::mint(ALICE, U256::from(10), 10).with_instrument(TOKEN)
        );
        assert_eq!(events[1], TransferEvent::burn(BOB, U256::from(2), 20).with_instrument(TOKEN));
        assert_eq!(
            events[2],
            TransferEvent::new(ALICE, BOB, U256::from(5), 20).with_instrument(TOKEN)
        );
    }

    #[test]
    fn rejects_logs_without_block_position() {
        let mut log = transfer_log(ALICE, BOB, 1, (1, 0, 0));
        log.block_number = None;
        let err = decode_transfer_logs(&[log]).unwrap_err();
        assert!(err.to_string().contains("missing its block position"));
    }
}
