//! Thin conveniences over `publish`: the MD5 challenge-response login helper
//! and logoff. Neither contains any real engineering — they're just a
//! documented sequence of actions (per the core design's own framing of
//! these as "external collaborators").

use std::fmt::Write as _;

use md5::{Digest, Md5};

use crate::client::core::Client;
use crate::client::error::{ClientError, Result};

pub async fn login(client: &Client, username: &str, secret: &str, use_md5: bool) -> Result<bool> {
    let reply = if use_md5 {
        let challenge_reply = client
            .publish(client.action("Challenge").with("AuthType", "MD5"))
            .await?;
        let challenge = challenge_reply.get("Challenge").ok_or_else(|| {
            ClientError::MalformedMessage("Challenge response missing Challenge field".into())
        })?;

        let mut hasher = Md5::new();
        hasher.update(challenge.as_bytes());
        hasher.update(secret.as_bytes());
        let key = hex_encode(&hasher.finalize());

        client
            .publish(
                client
                    .action("Login")
                    .with("AuthType", "MD5")
                    .with("Username", username)
                    .with("Key", key),
            )
            .await?
    } else {
        client
            .publish(
                client
                    .action("Login")
                    .with("Username", username)
                    .with("Secret", secret),
            )
            .await?
    };

    Ok(reply.get("Response") == Some("Success"))
}

pub async fn logoff(client: &Client) -> Result<bool> {
    let reply = client.publish(client.action("Logoff")).await?;
    Ok(reply.get("Response") == Some("Goodbye"))
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String never fails");
    }
    out
}
