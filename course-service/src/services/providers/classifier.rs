//! Maps provider failures onto the short messages shown to course authors.
//!
//! Rules are checked in order and the first match wins. The status code and
//! the lower-cased provider message are the only inputs, so the result is
//! stable for a given error.

use super::ProviderError;

pub const QUOTA_EXCEEDED: &str = "Límite de cuota excedido. Revisa tu plan y facturación.";
pub const LOW_CREDIT_BALANCE: &str = "Tu balance de créditos en Anthropic es muy bajo.";
pub const PAYMENT_REQUIRED: &str = "Error de pago requerido. Revisa tu método de pago.";
pub const INVALID_API_KEY: &str = "La API Key es inválida o ha sido revocada.";
pub const MODEL_NOT_FOUND: &str = "El modelo de IA no fue encontrado. Puede estar desactualizado.";

/// Classify a raw provider failure given its HTTP status (if any) and message.
pub fn classify(status: Option<u16>, raw_message: &str) -> String {
    let message = raw_message.to_lowercase();

    if status == Some(429) || message.contains("quota") {
        return QUOTA_EXCEEDED.to_string();
    }
    if message.contains("credit balance is too low") {
        return LOW_CREDIT_BALANCE.to_string();
    }
    if status == Some(402) {
        return PAYMENT_REQUIRED.to_string();
    }
    if status == Some(401) || message.contains("invalid api key") {
        return INVALID_API_KEY.to_string();
    }
    if status == Some(404) || message.contains("model is not found") {
        return MODEL_NOT_FOUND.to_string();
    }

    format!("Error inesperado: {}", raw_message)
}

/// Classify a [`ProviderError`] raised by one of the provider clients.
pub fn classify_error(error: &ProviderError) -> String {
    classify(error.status(), &error.message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_quota_regardless_of_message() {
        assert_eq!(classify(Some(429), "invalid api key"), QUOTA_EXCEEDED);
        assert_eq!(classify(Some(429), ""), QUOTA_EXCEEDED);
    }

    #[test]
    fn quota_substring_wins_over_status() {
        assert_eq!(
            classify(Some(401), "You exceeded your current QUOTA"),
            QUOTA_EXCEEDED
        );
    }

    #[test]
    fn low_credit_balance_from_message() {
        assert_eq!(
            classify(
                Some(400),
                "Your credit balance is too low to access the Anthropic API."
            ),
            LOW_CREDIT_BALANCE
        );
    }

    #[test]
    fn status_402_is_payment_required() {
        assert_eq!(classify(Some(402), "Payment Required"), PAYMENT_REQUIRED);
    }

    #[test]
    fn status_401_is_invalid_key_regardless_of_message() {
        assert_eq!(classify(Some(401), "unauthorized"), INVALID_API_KEY);
        assert_eq!(classify(Some(401), "model is not found"), INVALID_API_KEY);
    }

    #[test]
    fn invalid_key_from_message_without_status() {
        assert_eq!(classify(None, "Invalid API Key provided"), INVALID_API_KEY);
    }

    #[test]
    fn stale_model_from_status_or_message() {
        assert_eq!(classify(Some(404), "not found"), MODEL_NOT_FOUND);
        assert_eq!(
            classify(Some(400), "models/gemini-pro model is not found"),
            MODEL_NOT_FOUND
        );
    }

    #[test]
    fn fallback_embeds_raw_text() {
        assert_eq!(
            classify(Some(500), "Upstream Exploded"),
            "Error inesperado: Upstream Exploded"
        );
        assert_eq!(
            classify(None, "connection refused"),
            "Error inesperado: connection refused"
        );
    }

    #[test]
    fn classifies_provider_errors() {
        let err = ProviderError::Api {
            status: 401,
            message: "Incorrect API key provided".to_string(),
        };
        assert_eq!(classify_error(&err), INVALID_API_KEY);

        let err = ProviderError::Network("dns error".to_string());
        assert_eq!(classify_error(&err), "Error inesperado: dns error");
    }
}
