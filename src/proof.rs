//! Parsing of the payment provider's return-leg parameters.

use serde::Deserialize;

use crate::errors::CheckoutError;

/// Raw query parameters as they arrive on the return URL. Everything is
/// optional at this layer; validation decides what is fatal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnParams {
    #[serde(rename = "paymentKey")]
    pub payment_key: Option<String>,
    /// The provider's own order reference, distinct from the backend's
    /// order id.
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    pub amount: Option<String>,
}

/// Validated proof-of-payment from the provider. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProof {
    pub payment_key: String,
    pub provider_order_id: String,
    pub amount: i64,
}

impl PaymentProof {
    /// Validates the return parameters. Any missing or empty field, or a
    /// non-integer amount, is a terminal `INVALID_CALLBACK`; the saga must
    /// not reach the backend with a partial proof.
    pub fn from_params(params: &ReturnParams) -> Result<Self, CheckoutError> {
        let payment_key = required(&params.payment_key, "paymentKey")?;
        let provider_order_id = required(&params.order_id, "orderId")?;
        let raw_amount = required(&params.amount, "amount")?;
        let amount = raw_amount.parse::<i64>().map_err(|_| {
            CheckoutError::InvalidCallback(format!("amount is not an integer: {:?}", raw_amount))
        })?;

        Ok(Self {
            payment_key,
            provider_order_id,
            amount,
        })
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, CheckoutError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CheckoutError::InvalidCallback(format!(
            "missing required parameter {}",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(key: &str, order: &str, amount: &str) -> ReturnParams {
        ReturnParams {
            payment_key: Some(key.to_string()),
            order_id: Some(order.to_string()),
            amount: Some(amount.to_string()),
        }
    }

    #[test]
    fn parses_a_complete_callback() {
        let proof = PaymentProof::from_params(&params("pk_live_1", "prov-55", "12900")).unwrap();
        assert_eq!(proof.payment_key, "pk_live_1");
        assert_eq!(proof.provider_order_id, "prov-55");
        assert_eq!(proof.amount, 12900);
    }

    #[test]
    fn missing_amount_is_invalid_callback() {
        let mut p = params("pk", "prov-1", "100");
        p.amount = None;
        let err = PaymentProof::from_params(&p).unwrap_err();
        assert_eq!(err.reason(), "INVALID_CALLBACK");
    }

    #[test]
    fn empty_payment_key_is_invalid_callback() {
        let err = PaymentProof::from_params(&params("  ", "prov-1", "100")).unwrap_err();
        assert_eq!(err.reason(), "INVALID_CALLBACK");
    }

    #[test]
    fn non_numeric_amount_is_invalid_callback() {
        let err = PaymentProof::from_params(&params("pk", "prov-1", "12.9k")).unwrap_err();
        assert_eq!(err.reason(), "INVALID_CALLBACK");
    }
}
