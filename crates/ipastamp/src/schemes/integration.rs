//! Third-party SDK registrations.

use super::registry::{SchemeSlot, SlotOutcome, UrlTypes};
use crate::document::MetadataDocument;
use crate::Result;
use std::path::Path;

const FACEBOOK_SLOT: SchemeSlot = SchemeSlot::prefixed("fb");
const GOOGLE_SLOT: SchemeSlot = SchemeSlot::prefixed(GOOGLE_SCHEME_PREFIX);
const WECHAT_SLOT: SchemeSlot = SchemeSlot::prefixed("wx")
    .with_lookup_name("com.wechat")
    .with_label("com.wechat");
const TENCENT_SLOT: SchemeSlot = SchemeSlot::prefixed("tencent").with_label("tencent");
const QQ_SLOT: SchemeSlot = SchemeSlot::prefixed("qq").with_label("qq");
const LINKDEEP_APP_SLOT: SchemeSlot = SchemeSlot::named("com.link-deep.appkey");
const LINKDEEP_GROUP_SLOT: SchemeSlot = SchemeSlot::named("com.link-deep.groupkey");

const GOOGLE_SCHEME_PREFIX: &str = "com.googleusercontent.apps";
const GOOGLE_CLIENT_ID_SUFFIX: &str = ".apps.googleusercontent.com";

/// What an integration operates on.
#[derive(Debug)]
pub struct Context<'a> {
    /// The session's metadata document.
    pub document: &'a mut MetadataDocument,
    /// The extracted `.app` directory.
    pub app_directory: &'a Path,
}

/// One SDK's identifiers and URL-scheme registration.
///
/// Every field is optional; `None` leaves the corresponding key and scheme
/// untouched. Applying the same value twice changes nothing the second time.
///
/// # Examples
///
/// ```no_run
/// use ipastamp::{Integration, IpaEditor};
///
/// let mut editor = IpaEditor::open("Template.ipa")?;
/// editor.apply(&Integration::Facebook {
///     app_id: Some("555".into()),
///     client_token: None,
///     display_name: Some("My App".into()),
/// })?;
/// # Ok::<(), ipastamp::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integration {
    /// `FacebookAppID`, `FacebookClientToken`, `FacebookDisplayName` and the
    /// `fb{app_id}` scheme.
    Facebook {
        /// Numeric app id.
        app_id: Option<String>,
        /// Client token.
        client_token: Option<String>,
        /// Display name shown in the login dialog.
        display_name: Option<String>,
    },
    /// `GIDClientID` and the reversed client id scheme.
    Google {
        /// OAuth client id ending in `.apps.googleusercontent.com`.
        client_id: Option<String>,
    },
    /// The `wx…` app id scheme.
    WeChat {
        /// WeChat app id.
        app_id: Option<String>,
    },
    /// `QQAppID`, the `tencent{id}` scheme and the `qq{hex id}` scheme.
    QQ {
        /// Decimal QQ app id.
        app_id: Option<String>,
    },
    /// Named `com.link-deep.appkey` / `com.link-deep.groupkey` entries.
    LinkDeep {
        /// App key scheme.
        app_key: Option<String>,
        /// Group key scheme.
        group_key: Option<String>,
    },
}

impl Integration {
    /// Short name for log messages.
    pub fn name(&self) -> &'static str {
        match self {
            Integration::Facebook { .. } => "Facebook",
            Integration::Google { .. } => "Google",
            Integration::WeChat { .. } => "WeChat",
            Integration::QQ { .. } => "QQ",
            Integration::LinkDeep { .. } => "LinkDeep",
        }
    }

    /// Write this integration's keys and schemes into the document.
    ///
    /// Only the in-memory document changes; committing is up to the caller.
    pub fn apply(&self, context: &mut Context<'_>) -> Result<()> {
        let document = &mut *context.document;
        match self {
            Integration::Facebook {
                app_id,
                client_token,
                display_name,
            } => {
                if let Some(app_id) = app_id {
                    document.replace("FacebookAppID", app_id.as_str());
                    place(document, self.name(), &FACEBOOK_SLOT, vec![format!("fb{app_id}")]);
                } else {
                    tracing::debug!("Facebook app id not set, keeping FacebookAppID and fb scheme");
                }
                set_optional(document, "FacebookClientToken", client_token.as_deref());
                set_optional(document, "FacebookDisplayName", display_name.as_deref());
            }
            Integration::Google { client_id } => {
                let Some(client_id) = client_id else {
                    tracing::debug!("Google client id not set, skipping");
                    return Ok(());
                };
                if !is_valid_google_client_id(client_id) {
                    tracing::warn!("Ignoring malformed Google client id: {client_id}");
                    return Ok(());
                }
                document.replace("GIDClientID", client_id.as_str());
                place(document, self.name(), &GOOGLE_SLOT, vec![reverse_domain(client_id)]);
            }
            Integration::WeChat { app_id } => match app_id {
                Some(app_id) => place(document, self.name(), &WECHAT_SLOT, vec![app_id.clone()]),
                None => tracing::debug!("WeChat app id not set, skipping"),
            },
            Integration::QQ { app_id } => {
                let Some(app_id) = app_id else {
                    tracing::debug!("QQ app id not set, skipping");
                    return Ok(());
                };
                document.replace("QQAppID", app_id.as_str());

                let mut types = UrlTypes::load(document);
                let outcome = types.apply(&TENCENT_SLOT, &[format!("tencent{app_id}")]);
                log_outcome(self.name(), "tencent", outcome);
                match qq_hex_scheme(app_id) {
                    Some(scheme) => {
                        let outcome = types.apply(&QQ_SLOT, &[scheme]);
                        log_outcome(self.name(), "qq", outcome);
                    }
                    None => tracing::debug!("QQ app id {app_id} is not numeric, skipping qq scheme"),
                }
                types.store(document);
            }
            Integration::LinkDeep { app_key, group_key } => {
                for (slot, value) in [(&LINKDEEP_APP_SLOT, app_key), (&LINKDEEP_GROUP_SLOT, group_key)] {
                    match value {
                        Some(value) => place(document, self.name(), slot, vec![value.clone()]),
                        None => tracing::debug!(
                            "LinkDeep {} not set, skipping",
                            slot.label.unwrap_or_default()
                        ),
                    }
                }
            }
        }
        Ok(())
    }
}

fn place(document: &mut MetadataDocument, integration: &str, slot: &SchemeSlot, schemes: Vec<String>) {
    let mut types = UrlTypes::load(document);
    let outcome = types.apply(slot, &schemes);
    log_outcome(integration, &schemes.join(","), outcome);
    types.store(document);
}

fn log_outcome(integration: &str, scheme: &str, outcome: SlotOutcome) {
    match outcome {
        SlotOutcome::MatchedName(i) => {
            tracing::debug!("{integration}: replaced schemes of named URL type #{i} with {scheme}")
        }
        SlotOutcome::MatchedPrefix(i) => {
            tracing::debug!("{integration}: updated URL type #{i} to {scheme}")
        }
        SlotOutcome::Appended(i) => {
            tracing::debug!("{integration}: appended URL type #{i} for {scheme}")
        }
    }
}

fn set_optional(document: &mut MetadataDocument, key: &str, value: Option<&str>) {
    match value {
        Some(value) => document.replace(key, value),
        None => tracing::debug!("{key} not set, skipping"),
    }
}

/// Whether `client_id` looks like `<id>.apps.googleusercontent.com`.
pub fn is_valid_google_client_id(client_id: &str) -> bool {
    client_id.len() > GOOGLE_CLIENT_ID_SUFFIX.len() && client_id.ends_with(GOOGLE_CLIENT_ID_SUFFIX)
}

/// Reverse the dot-separated labels of a domain-style identifier.
pub fn reverse_domain(value: &str) -> String {
    value.split('.').rev().collect::<Vec<_>>().join(".")
}

/// `qq` followed by the lowercase hex form of a decimal id.
pub fn qq_hex_scheme(app_id: &str) -> Option<String> {
    let id: u64 = app_id.parse().ok()?;
    Some(format!("qq{id:x}"))
}
