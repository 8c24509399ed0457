//! Session issuance and refresh rotation.
//!
//! Every login mints an access/refresh pair. The refresh token is also the
//! session row's key; refreshing rotates the row in place, so a stolen old
//! refresh token dies the moment the legitimate client rotates.

use rusqlite::Connection;
use tracing::debug;

use sienna_crypto::token::{TokenClaims, TokenKind, TokenSigner};
use sienna_crypto::CryptoError;
use sienna_db::queries;
use sienna_types::identity::Identity;
use sienna_types::{IdentityId, ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};

use crate::{AuthError, Result};

/// A freshly minted token pair.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Mints token pairs and maintains the session table.
pub struct SessionIssuer {
    signer: TokenSigner,
}

impl SessionIssuer {
    pub fn new(signer: TokenSigner) -> Self {
        Self { signer }
    }

    fn mint_pair(&self, sub: IdentityId, ident: &str, now: u64) -> Result<TokenPair> {
        let access = self.signer.mint(&TokenClaims::new(
            sub,
            ident,
            TokenKind::Access,
            now,
            ACCESS_TOKEN_TTL_SECS,
        ))?;
        let refresh = self.signer.mint(&TokenClaims::new(
            sub,
            ident,
            TokenKind::Refresh,
            now,
            REFRESH_TOKEN_TTL_SECS,
        ))?;
        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
            expires_in: ACCESS_TOKEN_TTL_SECS,
        })
    }

    /// Mint a pair for a just-authenticated identity and open a session.
    /// `authenticated_as` is the identifier the client logged in with
    /// (wallet address or email); it rides in the token claims.
    pub fn issue_tokens(
        &self,
        conn: &Connection,
        identity: &Identity,
        authenticated_as: &str,
        now: u64,
    ) -> Result<TokenPair> {
        let pair = self.mint_pair(identity.id, authenticated_as, now)?;
        queries::sessions::insert(
            conn,
            identity.id,
            &pair.refresh_token,
            now + REFRESH_TOKEN_TTL_SECS,
            now,
        )?;
        debug!(identity_id = identity.id, "session opened");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, rotating the session row.
    pub fn refresh(&self, conn: &Connection, refresh_token: &str, now: u64) -> Result<TokenPair> {
        let claims = match self.signer.verify(refresh_token, now) {
            Ok(claims) => claims,
            Err(CryptoError::TokenExpired) => return Err(AuthError::Expired),
            Err(_) => return Err(AuthError::InvalidToken),
        };
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }

        let session = queries::sessions::find_by_token(conn, refresh_token)?
            .ok_or(AuthError::InvalidToken)?;
        if session.expires_at < now {
            queries::sessions::delete_by_token(conn, refresh_token)?;
            return Err(AuthError::Expired);
        }

        let identity = queries::identities::get(conn, session.identity_id)?;
        if !identity.active {
            queries::sessions::delete_for_identity(conn, identity.id)?;
            return Err(AuthError::UserNotFound);
        }

        let pair = self.mint_pair(claims.sub, &claims.ident, now)?;
        let rotated = queries::sessions::rotate(
            conn,
            refresh_token,
            &pair.refresh_token,
            now + REFRESH_TOKEN_TTL_SECS,
        )?;
        if rotated == 0 {
            // A concurrent refresh already rotated this session.
            return Err(AuthError::InvalidToken);
        }
        Ok(pair)
    }

    /// Drop every session for the identity. Idempotent.
    pub fn logout(&self, conn: &Connection, identity_id: IdentityId) -> Result<()> {
        let dropped = queries::sessions::delete_for_identity(conn, identity_id)?;
        debug!(identity_id, dropped, "logged out");
        Ok(())
    }

    /// Resolve an access token to its live identity. The guard in front of
    /// every authenticated daemon method.
    pub fn authenticate(&self, conn: &Connection, access_token: &str, now: u64) -> Result<Identity> {
        let claims = match self.signer.verify(access_token, now) {
            Ok(claims) => claims,
            Err(CryptoError::TokenExpired) => return Err(AuthError::Expired),
            Err(_) => return Err(AuthError::InvalidToken),
        };
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidToken);
        }
        let identity = match queries::identities::get(conn, claims.sub) {
            Ok(identity) => identity,
            Err(sienna_db::DbError::NotFound(_)) => return Err(AuthError::UserNotFound),
            Err(e) => return Err(e.into()),
        };
        if !identity.active {
            return Err(AuthError::UserNotFound);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sienna_types::identity::Role;
    use sienna_types::WalletAddress;

    fn setup() -> (Connection, Identity, SessionIssuer) {
        let conn = sienna_db::open_memory().expect("open test db");
        let wallet = WalletAddress::from_bytes(&[1u8; 20]);
        let id = queries::identities::insert_wallet(&conn, &wallet, "user_session", Role::Fan, 100)
            .expect("insert identity");
        let identity = queries::identities::get(&conn, id).expect("get identity");
        (conn, identity, SessionIssuer::new(TokenSigner::new([9u8; 32])))
    }

    #[test]
    fn test_issue_and_authenticate() {
        let (conn, identity, issuer) = setup();
        let pair = issuer
            .issue_tokens(&conn, &identity, "0xwallet", 1_000)
            .expect("issue");
        assert_eq!(pair.expires_in, ACCESS_TOKEN_TTL_SECS);

        let back = issuer
            .authenticate(&conn, &pair.access_token, 1_100)
            .expect("authenticate");
        assert_eq!(back.id, identity.id);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let (conn, identity, issuer) = setup();
        let pair = issuer
            .issue_tokens(&conn, &identity, "x", 1_000)
            .expect("issue");
        assert!(matches!(
            issuer.authenticate(&conn, &pair.refresh_token, 1_100),
            Err(AuthError::InvalidToken)
        ));
        // And the other way round.
        assert!(matches!(
            issuer.refresh(&conn, &pair.access_token, 1_100),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_refresh_rotates_session() {
        let (conn, identity, issuer) = setup();
        let first = issuer
            .issue_tokens(&conn, &identity, "x", 1_000)
            .expect("issue");
        let second = issuer
            .refresh(&conn, &first.refresh_token, 2_000)
            .expect("refresh");
        assert_ne!(first.refresh_token, second.refresh_token);

        // The old refresh token lost its session row.
        assert!(matches!(
            issuer.refresh(&conn, &first.refresh_token, 2_001),
            Err(AuthError::InvalidToken)
        ));
        // The new one works.
        issuer
            .refresh(&conn, &second.refresh_token, 2_002)
            .expect("refresh again");
    }

    #[test]
    fn test_expired_access_token() {
        let (conn, identity, issuer) = setup();
        let pair = issuer
            .issue_tokens(&conn, &identity, "x", 1_000)
            .expect("issue");
        let late = 1_000 + ACCESS_TOKEN_TTL_SECS + 1;
        assert!(matches!(
            issuer.authenticate(&conn, &pair.access_token, late),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_expired_session_row_deleted_on_refresh() {
        let (conn, identity, issuer) = setup();
        let pair = issuer
            .issue_tokens(&conn, &identity, "x", 1_000)
            .expect("issue");
        // Age the session row itself, keeping the token MAC-valid.
        conn.execute("UPDATE sessions SET expires_at = 1500", [])
            .expect("age session");

        assert!(matches!(
            issuer.refresh(&conn, &pair.refresh_token, 2_000),
            Err(AuthError::Expired)
        ));
        assert!(queries::sessions::find_by_token(&conn, &pair.refresh_token)
            .expect("query")
            .is_none());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let (conn, identity, issuer) = setup();
        let pair = issuer
            .issue_tokens(&conn, &identity, "x", 1_000)
            .expect("issue");
        issuer.logout(&conn, identity.id).expect("logout");
        issuer.logout(&conn, identity.id).expect("logout again");
        assert!(matches!(
            issuer.refresh(&conn, &pair.refresh_token, 1_100),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_foreign_signer_rejected() {
        let (conn, identity, issuer) = setup();
        let pair = issuer
            .issue_tokens(&conn, &identity, "x", 1_000)
            .expect("issue");
        let other = SessionIssuer::new(TokenSigner::new([8u8; 32]));
        assert!(matches!(
            other.authenticate(&conn, &pair.access_token, 1_100),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_deactivated_identity_rejected_and_sessions_dropped() {
        let (conn, identity, issuer) = setup();
        let pair = issuer
            .issue_tokens(&conn, &identity, "x", 1_000)
            .expect("issue");
        queries::identities::set_active(&conn, identity.id, false).expect("deactivate");

        assert!(matches!(
            issuer.authenticate(&conn, &pair.access_token, 1_100),
            Err(AuthError::UserNotFound)
        ));
        assert!(matches!(
            issuer.refresh(&conn, &pair.refresh_token, 1_100),
            Err(AuthError::UserNotFound)
        ));
        assert!(queries::sessions::find_by_token(&conn, &pair.refresh_token)
            .expect("query")
            .is_none());
    }
}
