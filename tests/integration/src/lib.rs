//! Shared harness for the claim workflow integration tests: scripted
//! collaborator fakes and a `TestRig` that wires a coordinator over the
//! in-memory store.

use async_trait::async_trait;
use ed25519_dalek::Signer;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use mth_claims::{
    signed_message_challenge, ApprovalCoordinator, AuthorityDirectory, Claim, ClaimStore,
    ConsensusPolicy, EvaluatorError, MediaRefs, MemoryClaimStore, ProfileFields, ProfilePublisher,
    ProofEvaluator, ProofEvidence, PublishError, RetryConfig, SubmitClaim, TxtResolver,
};
use mth_core::{ChainId, TokenAddress, UserId};

/// One scripted resolver response. The last step repeats once the script
/// is exhausted.
#[derive(Debug, Clone)]
pub enum TxtStep {
    Records(Vec<String>),
    Timeout,
    Nxdomain,
    Unavailable,
}

impl TxtStep {
    fn to_result(&self) -> Result<Vec<String>, EvaluatorError> {
        match self {
            Self::Records(records) => Ok(records.clone()),
            Self::Timeout => Err(EvaluatorError::Timeout),
            Self::Nxdomain => Err(EvaluatorError::Lookup("NXDOMAIN".into())),
            Self::Unavailable => Err(EvaluatorError::Unavailable("resolver down".into())),
        }
    }
}

/// TXT resolver driven by a script of steps. Steps are consumed in
/// order; once the script runs dry the last consumed step repeats, so a
/// one-step script behaves like a steady-state answer.
pub struct ScriptedTxtResolver {
    state: Mutex<ScriptState>,
    calls: AtomicU32,
}

struct ScriptState {
    script: std::collections::VecDeque<TxtStep>,
    last: Option<TxtStep>,
}

impl ScriptedTxtResolver {
    pub fn new(steps: impl IntoIterator<Item = TxtStep>) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                script: steps.into_iter().collect(),
                last: None,
            }),
            calls: AtomicU32::new(0),
        }
    }

    /// Append steps mid-test (e.g. "the submitter published the record").
    pub fn push(&self, step: TxtStep) {
        self.state.lock().unwrap().script.push_back(step);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TxtResolver for ScriptedTxtResolver {
    async fn lookup_txt(&self, _name: &str) -> Result<Vec<String>, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let step = match state.script.pop_front() {
            Some(step) => {
                state.last = Some(step.clone());
                step
            }
            None => state
                .last
                .clone()
                .unwrap_or(TxtStep::Records(Vec::new())),
        };
        step.to_result()
    }
}

/// Authority directory with a single fixed answer.
pub struct FixedAuthority(pub Option<String>);

#[async_trait]
impl AuthorityDirectory for FixedAuthority {
    async fn token_authority(
        &self,
        _chain: &ChainId,
        _token: &TokenAddress,
    ) -> Result<Option<String>, EvaluatorError> {
        Ok(self.0.clone())
    }
}

/// Publisher that counts publications instead of delivering them.
#[derive(Default)]
pub struct CountingPublisher {
    count: AtomicU32,
}

impl CountingPublisher {
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfilePublisher for CountingPublisher {
    async fn publish(&self, _claim: &Claim) -> Result<(), PublishError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A coordinator over the in-memory store with scripted collaborators.
pub struct TestRig {
    pub coordinator: Arc<ApprovalCoordinator>,
    pub store: Arc<MemoryClaimStore>,
    pub resolver: Arc<ScriptedTxtResolver>,
    pub publisher: Arc<CountingPublisher>,
}

impl TestRig {
    /// Rig with the real Ed25519 verifier, a fixed authority answer, and
    /// the given resolver script. Retries are fast (2 attempts, 1 ms).
    pub fn new(authority: Option<String>, steps: impl IntoIterator<Item = TxtStep>) -> Self {
        let store = Arc::new(MemoryClaimStore::new());
        let resolver = Arc::new(ScriptedTxtResolver::new(steps));
        let publisher = Arc::new(CountingPublisher::default());

        let evaluator = ProofEvaluator::new(
            Arc::new(FixedAuthority(authority)),
            Arc::new(mth_claims::Ed25519SignatureVerifier),
            Arc::clone(&resolver) as Arc<dyn TxtResolver>,
        );
        let coordinator = Arc::new(ApprovalCoordinator::new(
            Arc::clone(&store) as Arc<dyn ClaimStore>,
            evaluator,
            Arc::clone(&publisher) as Arc<dyn ProfilePublisher>,
            ConsensusPolicy::default(),
            RetryConfig {
                max_attempts: 2,
                backoff_ms: 1,
                eval_timeout_ms: 1_000,
            },
        ));

        Self {
            coordinator,
            store,
            resolver,
            publisher,
        }
    }
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// A SocialPost submission for the given token.
pub fn social_submission(token: &str, submitter: &str) -> SubmitClaim {
    SubmitClaim {
        chain: ChainId::new("solana").unwrap(),
        token: TokenAddress::new(token).unwrap(),
        submitter: user(submitter),
        profile: ProfileFields {
            display_name: Some("Meme Token".into()),
            website: Some("https://memetoken.wtf".into()),
            ..Default::default()
        },
        media: MediaRefs::default(),
        evidence: ProofEvidence::SocialPost {
            post_url: "https://x.com/memedev/status/1".into(),
        },
    }
}

/// A DnsTxtRecord submission for the given token and domain.
pub fn dns_submission(token: &str, submitter: &str, domain: &str) -> SubmitClaim {
    SubmitClaim {
        evidence: ProofEvidence::DnsTxtRecord {
            domain: domain.into(),
        },
        ..social_submission(token, submitter)
    }
}

/// A SignedMessage submission carrying a real signature over the
/// deterministic challenge, produced with `key`.
pub fn signed_submission(
    token: &str,
    submitter: &str,
    key: &ed25519_dalek::SigningKey,
) -> SubmitClaim {
    let token_addr = TokenAddress::new(token).unwrap();
    let submitter_id = user(submitter);
    let issued_at = chrono::Utc::now().timestamp();
    let message = signed_message_challenge(&token_addr, &submitter_id, issued_at);
    let signature = hex::encode(key.sign(message.as_bytes()).to_bytes());

    SubmitClaim {
        evidence: ProofEvidence::SignedMessage {
            signature,
            issued_at,
        },
        ..social_submission(token, submitter)
    }
}

/// Generate an authority keypair and its hex-encoded public key.
pub fn authority_keypair() -> (ed25519_dalek::SigningKey, String) {
    let key = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
    let hex_pub = hex::encode(key.verifying_key().to_bytes());
    (key, hex_pub)
}
