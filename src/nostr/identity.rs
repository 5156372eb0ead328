use nostr_sdk::prelude::*;

use crate::error::{ChatError, Result};
use crate::session::{generate_nickname, User};

/// A Nostr key pair plus the profile it signs messages as.
#[derive(Debug, Clone)]
pub struct Identity {
    pub keys: Keys,
    pub pubkey: String,
    pub nickname: String,
    pub photo_url: Option<String>,
}

impl Identity {
    /// Fresh key pair. Without a chosen name a random nickname is used.
    pub fn generate(display_name: Option<String>) -> Self {
        let keys = Keys::generate();
        let pubkey = keys.public_key().to_hex();
        let nickname = display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(generate_nickname);

        Self {
            keys,
            pubkey,
            nickname,
            photo_url: None,
        }
    }

    /// Parse an `nsec` secret key. The profile is filled in separately.
    pub fn from_nsec(nsec: &str) -> Result<Self> {
        let secret_key = SecretKey::from_bech32(nsec.trim())
            .map_err(|e| ChatError::InvalidSecretKey(e.to_string()))?;
        let keys = Keys::new(secret_key);
        let pubkey = keys.public_key().to_hex();
        let nickname = format!("user{}", &pubkey[..8]);

        Ok(Self {
            keys,
            pubkey,
            nickname,
            photo_url: None,
        })
    }

    pub fn to_nsec(&self) -> Result<String> {
        self.keys
            .secret_key()
            .map_err(|e| ChatError::InvalidSecretKey(e.to_string()))?
            .to_bech32()
            .map_err(|e| ChatError::InvalidSecretKey(e.to_string()))
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    pub fn user(&self) -> User {
        User {
            uid: self.pubkey.clone(),
            display_name: self.nickname.clone(),
            photo_url: self.photo_url.clone(),
        }
    }

    pub fn sign_event(&self, event_builder: EventBuilder) -> Result<Event> {
        event_builder
            .to_event(&self.keys)
            .map_err(|e| ChatError::Relay(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identity_uses_chosen_name() {
        let identity = Identity::generate(Some("ada".to_string()));
        assert_eq!(identity.nickname, "ada");
        assert_eq!(identity.user().uid, identity.pubkey);

        let blank = Identity::generate(Some("   ".to_string()));
        assert_ne!(blank.nickname.trim(), "");
    }

    #[test]
    fn nsec_round_trips_to_same_pubkey() {
        let original = Identity::generate(None);
        let nsec = original.to_nsec().unwrap();
        assert!(nsec.starts_with("nsec1"));

        let restored = Identity::from_nsec(&nsec).unwrap();
        assert_eq!(restored.pubkey, original.pubkey);
        assert!(restored.nickname.starts_with("user"));
    }

    #[test]
    fn garbage_nsec_is_rejected() {
        assert!(matches!(
            Identity::from_nsec("nsec1notakey"),
            Err(ChatError::InvalidSecretKey(_))
        ));
    }
}
