use super::engine::{Credential, DigestAlgorithm, EngineError, SignParams, SigningEngine};

/// One way of asking the engine for a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Sign into the negotiated field with the engine's default digest.
    Standard,
    /// Let the engine create its own default field.
    CrossReferenceFallback,
    /// No field name and a pinned SHA-256 digest.
    MinimalConfiguration,
}

impl Strategy {
    /// Attempt order. Only the first entry runs unconditionally.
    pub const ORDER: [Strategy; 3] = [
        Strategy::Standard,
        Strategy::CrossReferenceFallback,
        Strategy::MinimalConfiguration,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Standard => "standard",
            Strategy::CrossReferenceFallback => "xref-fallback",
            Strategy::MinimalConfiguration => "minimal-configuration",
        }
    }

    /// Engine parameters for this strategy. The negotiated name is only used
    /// by `Standard`; later layers sign without one.
    pub fn params(&self, negotiated_field: &str) -> SignParams {
        match self {
            Strategy::Standard => SignParams {
                field_name: Some(negotiated_field.to_string()),
                digest: None,
            },
            Strategy::CrossReferenceFallback => SignParams {
                field_name: None,
                digest: None,
            },
            Strategy::MinimalConfiguration => SignParams {
                field_name: None,
                digest: Some(DigestAlgorithm::Sha256),
            },
        }
    }
}

#[derive(Debug)]
pub enum SigningOutcome {
    Signed {
        document: Vec<u8>,
        strategy: Strategy,
    },
    Failed {
        cause: EngineError,
        attempted: Vec<Strategy>,
    },
}

/// Runs the strategies in order and stops at the first success.
///
/// A failed `Standard` attempt only falls through to the later layers when
/// the engine reports a cross-reference defect; anything else is returned
/// as is.
pub fn sign_with_fallback(
    engine: &dyn SigningEngine,
    pdf: &[u8],
    credential: &Credential,
    negotiated_field: &str,
) -> SigningOutcome {
    let mut attempted = Vec::with_capacity(Strategy::ORDER.len());
    let mut last_error = None;

    for strategy in Strategy::ORDER {
        if let Some(error) = &last_error {
            if attempted.len() == 1 && !is_fallback_eligible(error) {
                break;
            }
        }

        attempted.push(strategy);
        let params = strategy.params(negotiated_field);

        match engine.sign(pdf, &params, credential) {
            Ok(document) => {
                tracing::info!(
                    strategy = strategy.name(),
                    field = params.field_name.as_deref().unwrap_or("<engine default>"),
                    signed_bytes = document.len(),
                    "document signed"
                );
                return SigningOutcome::Signed { document, strategy };
            }
            Err(error) => {
                tracing::warn!(
                    strategy = strategy.name(),
                    structural = error.is_structural(),
                    error = %error,
                    "signing attempt failed"
                );
                last_error = Some(error);
            }
        }
    }

    let cause = last_error.unwrap_or_else(|| EngineError::Signing("no signing strategy ran".to_string()));
    SigningOutcome::Failed { cause, attempted }
}

fn is_fallback_eligible(error: &EngineError) -> bool {
    error.is_structural()
}
