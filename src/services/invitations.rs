//! Affiliate invitation confirmation.
//!
//! `PENDING -> ACCEPTED` on success, `PENDING -> EXPIRED` when confirmed past
//! its deadline. Any other rejection leaves the invitation `PENDING`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::{thread_rng, Rng};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{one_time_credential, AuthProvider, UserAccount};
use crate::errors::ServiceError;
use crate::events::{Event, EventBus};
use crate::metrics::{INVITATIONS_ACCEPTED, INVITATIONS_REJECTED};
use crate::models::{Affiliate, AffiliateStatus, InvitationStatus};
use crate::store::CommerceStore;

/// Affiliate code alphabet without look-alikes (0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const AFFILIATE_CODE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationRejection {
    NotFound,
    NotPending(InvitationStatus),
    Expired,
    AlreadyAffiliated,
    CodeUnavailable,
}

impl InvitationRejection {
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "INVITATION_NOT_FOUND",
            Self::NotPending(_) => "INVITATION_NOT_PENDING",
            Self::Expired => "INVITATION_EXPIRED",
            Self::AlreadyAffiliated => "ALREADY_AFFILIATED",
            Self::CodeUnavailable => "AFFILIATE_CODE_UNAVAILABLE",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NotFound => "Convite não encontrado para este e-mail",
            Self::NotPending(InvitationStatus::Accepted) => "Este convite já foi utilizado",
            Self::NotPending(InvitationStatus::Expired) | Self::Expired => "Este convite expirou",
            Self::NotPending(_) => "Este convite não está mais disponível",
            Self::AlreadyAffiliated => "Você já é afiliado desta loja",
            Self::CodeUnavailable => {
                "Não foi possível gerar seu código de afiliado. Tente novamente"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvitationConfirmation {
    Accepted {
        affiliate: Affiliate,
        user_created: bool,
    },
    Rejected(InvitationRejection),
}

fn random_affiliate_code() -> String {
    let mut rng = thread_rng();
    (0..AFFILIATE_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Clone)]
pub struct InvitationService {
    store: Arc<dyn CommerceStore>,
    auth: Arc<dyn AuthProvider>,
    events: EventBus,
    default_commission: Decimal,
    code_attempts: u32,
}

impl InvitationService {
    pub fn new(
        store: Arc<dyn CommerceStore>,
        auth: Arc<dyn AuthProvider>,
        events: EventBus,
        default_commission: Decimal,
        code_attempts: u32,
    ) -> Self {
        Self {
            store,
            auth,
            events,
            default_commission,
            code_attempts,
        }
    }

    pub async fn confirm(
        &self,
        token: &str,
        email: &str,
    ) -> Result<InvitationConfirmation, ServiceError> {
        self.confirm_at(token, email, Utc::now()).await
    }

    #[instrument(skip_all)]
    pub async fn confirm_at(
        &self,
        token: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<InvitationConfirmation, ServiceError> {
        let outcome = self.run(token.trim(), email.trim(), now).await?;
        if let InvitationConfirmation::Rejected(rejection) = outcome {
            INVITATIONS_REJECTED.with_label_values(&[rejection.code()]).inc();
            info!(reason = rejection.code(), "invitation confirmation rejected");
        }
        Ok(outcome)
    }

    async fn run(
        &self,
        token: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<InvitationConfirmation, ServiceError> {
        use InvitationConfirmation::Rejected;

        if token.is_empty() || email.is_empty() {
            return Ok(Rejected(InvitationRejection::NotFound));
        }
        let Some(invitation) = self.store.find_invitation(token, email).await? else {
            return Ok(Rejected(InvitationRejection::NotFound));
        };
        if invitation.status != InvitationStatus::Pending {
            return Ok(Rejected(InvitationRejection::NotPending(invitation.status)));
        }
        if invitation.is_expired_at(now) {
            let expired = self
                .store
                .transition_invitation_status(
                    &invitation.id,
                    InvitationStatus::Pending,
                    InvitationStatus::Expired,
                )
                .await?;
            if !expired {
                return Ok(Rejected(self.current_status(token, email).await?));
            }
            self.events.publish(Event::InvitationExpired {
                invitation_id: invitation.id.clone(),
            });
            return Ok(Rejected(InvitationRejection::Expired));
        }

        let existing = self.auth.find_user_by_email(email).await?;
        if let Some(ref user) = existing {
            let affiliations = self.store.find_affiliates_by_user(&user.id).await?;
            if affiliations
                .iter()
                .any(|a| a.company_relationed == invitation.store_id && a.is_active())
            {
                return Ok(Rejected(InvitationRejection::AlreadyAffiliated));
            }
        }

        let Some(invite_code) = self.generate_affiliate_code().await? else {
            return Ok(Rejected(InvitationRejection::CodeUnavailable));
        };

        let (user, user_created) = match existing {
            Some(user) => (user, false),
            None => self.provision_user(email).await?,
        };

        let affiliate = Affiliate {
            id: Uuid::new_v4().to_string(),
            user: user.id.clone(),
            // Wallets are provisioned out-of-band; until then the affiliate
            // cannot receive commission.
            wallet_id: String::new(),
            commission_rate: invitation.commission_rate.unwrap_or(self.default_commission),
            active: AffiliateStatus::Active,
            company_relationed: invitation.store_id.clone(),
            invite_code,
            created_at: now,
        };

        let accepted = self
            .store
            .accept_invitation(&invitation.id, affiliate.clone())
            .await;

        // The account outlives a failed accept; its owner can only reach it
        // through the reset link.
        if user_created {
            if let Err(err) = self.auth.send_password_reset(email).await {
                error!(user_id = %user.id, error = %err, "password reset e-mail failed");
            }
        }

        match accepted {
            Ok(true) => {}
            Ok(false) => {
                warn!(invitation_id = %invitation.id, "invitation left PENDING concurrently");
                return Ok(Rejected(self.current_status(token, email).await?));
            }
            Err(ServiceError::Conflict(reason)) => {
                warn!(invitation_id = %invitation.id, %reason, "affiliate code taken at commit");
                return Ok(Rejected(InvitationRejection::CodeUnavailable));
            }
            Err(err) => return Err(err),
        }

        INVITATIONS_ACCEPTED.inc();
        info!(
            invitation_id = %invitation.id,
            affiliate_id = %affiliate.id,
            company_id = %affiliate.company_relationed,
            user_created,
            "affiliate invitation accepted"
        );
        self.events.publish(Event::InvitationAccepted {
            invitation_id: invitation.id,
            affiliate_id: affiliate.id.clone(),
            company_id: affiliate.company_relationed.clone(),
        });

        Ok(InvitationConfirmation::Accepted {
            affiliate,
            user_created,
        })
    }

    /// Creates the account with a throwaway credential. The owner sets a real
    /// password through the reset e-mail. Returns whether the account is new;
    /// an account created concurrently for the same e-mail is reused.
    async fn provision_user(&self, email: &str) -> Result<(UserAccount, bool), ServiceError> {
        let credential = one_time_credential();
        match self.auth.create_user(email, &credential).await {
            Ok(user) => {
                info!(user_id = %user.id, "account provisioned for new affiliate");
                Ok((user, true))
            }
            Err(ServiceError::Conflict(reason)) => {
                let user = self
                    .auth
                    .find_user_by_email(email)
                    .await?
                    .ok_or(ServiceError::Conflict(reason))?;
                Ok((user, false))
            }
            Err(err) => Err(err),
        }
    }

    /// Rejection for an invitation that stopped being PENDING under us.
    async fn current_status(
        &self,
        token: &str,
        email: &str,
    ) -> Result<InvitationRejection, ServiceError> {
        let status = self
            .store
            .find_invitation(token, email)
            .await?
            .map_or(InvitationStatus::Accepted, |invitation| invitation.status);
        Ok(InvitationRejection::NotPending(status))
    }

    /// Rejection-samples a code not yet used by any affiliate.
    async fn generate_affiliate_code(&self) -> Result<Option<String>, ServiceError> {
        for attempt in 1..=self.code_attempts {
            let candidate = random_affiliate_code();
            if !self.store.affiliate_code_exists(&candidate).await? {
                return Ok(Some(candidate));
            }
            warn!(attempt, "affiliate code collision");
        }
        Ok(None)
    }
}
