// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::bundle::{SignedTransaction, TransactionSpec};
use crate::network::gas::GasParams;
use alloy::consensus::{SignableTransaction, TxEip1559, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::TxSignerSync;
use alloy::primitives::{Bytes, TxKind};
use alloy::signers::local::PrivateKeySigner;
use alloy_consensus::TxEnvelope;

/// Signs `spec` as an EIP-155 legacy or EIP-1559 transaction depending on its
/// gas parameters. `index` is the 1-based bundle position used in errors.
pub fn sign_spec(
    spec: TransactionSpec,
    chain_id: u64,
    signer: &PrivateKeySigner,
    index: usize,
) -> Result<SignedTransaction, AppError> {
    let signing_error = |e: alloy::signers::Error| AppError::Signing {
        index,
        reason: e.to_string(),
    };

    let envelope: TxEnvelope = match spec.gas_params {
        GasParams::Legacy { gas_price } => {
            let mut tx = TxLegacy {
                chain_id: Some(chain_id),
                nonce: spec.nonce,
                gas_price,
                gas_limit: spec.gas_limit,
                to: TxKind::Call(spec.to),
                value: spec.value,
                input: spec.data.clone(),
            };
            let sig = TxSignerSync::sign_transaction_sync(signer, &mut tx).map_err(signing_error)?;
            tx.into_signed(sig).into()
        }
        GasParams::Dynamic {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let mut tx = TxEip1559 {
                chain_id,
                nonce: spec.nonce,
                gas_limit: spec.gas_limit,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                to: TxKind::Call(spec.to),
                value: spec.value,
                access_list: AccessList::default(),
                input: spec.data.clone(),
            };
            let sig = TxSignerSync::sign_transaction_sync(signer, &mut tx).map_err(signing_error)?;
            tx.into_signed(sig).into()
        }
    };

    let raw = Bytes::from(envelope.encoded_2718());
    let hash = *envelope.tx_hash();
    Ok(SignedTransaction { spec, raw, hash })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bundle::BundleLeg;
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{Address, U256, keccak256};

    fn spec(gas_params: GasParams) -> TransactionSpec {
        TransactionSpec {
            leg: BundleLeg::Swap,
            nonce: 4,
            to: Address::repeat_byte(0x42),
            value: U256::from(1_000u64),
            data: Bytes::from(vec![0x7f, 0xf3, 0x6a, 0xb5]),
            gas_limit: 390_000,
            gas_params,
        }
    }

    #[test]
    fn dynamic_params_produce_typed_transaction() {
        let signer = PrivateKeySigner::random();
        let signed = sign_spec(
            spec(GasParams::Dynamic {
                max_fee_per_gas: 40,
                max_priority_fee_per_gas: 6,
            }),
            1,
            &signer,
            2,
        )
        .expect("sign");
        assert_eq!(signed.raw[0], 0x02);
        assert_eq!(signed.hash, keccak256(&signed.raw));
        let decoded = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).expect("decode");
        assert!(decoded.is_eip1559());
    }

    #[test]
    fn legacy_params_produce_eip155_transaction() {
        let signer = PrivateKeySigner::random();
        let signed = sign_spec(spec(GasParams::Legacy { gas_price: 30 }), 1, &signer, 1)
            .expect("sign");
        let decoded = TxEnvelope::decode_2718(&mut signed.raw.as_ref()).expect("decode");
        assert!(decoded.is_legacy());
        assert_eq!(signed.spec.nonce, 4);
        assert_eq!(signed.hash, *decoded.tx_hash());
    }
}
