use serde::Serialize;

use crate::models::Affiliate;

/// Why an affiliate cannot take part in a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AffiliateRejection {
    NotFound,
    Inactive,
    WrongCompany,
    MissingWallet,
}

impl AffiliateRejection {
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "AFFILIATE_NOT_FOUND",
            Self::Inactive => "AFFILIATE_INACTIVE",
            Self::WrongCompany => "AFFILIATE_WRONG_COMPANY",
            Self::MissingWallet => "AFFILIATE_NO_WALLET",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::NotFound => "Afiliado vinculado a este cupom não foi encontrado",
            Self::Inactive => "Afiliado vinculado a este cupom está inativo",
            Self::WrongCompany => "Afiliado vinculado a este cupom não pertence a esta loja",
            Self::MissingWallet => "Afiliado vinculado a este cupom não possui carteira configurada",
        }
    }
}

/// An affiliate is usable when it is active, promotes `company_id`, and has a
/// non-blank payout wallet.
pub fn check_affiliate(
    affiliate: Option<&Affiliate>,
    company_id: &str,
) -> Result<(), AffiliateRejection> {
    let affiliate = affiliate.ok_or(AffiliateRejection::NotFound)?;
    if !affiliate.is_active() {
        return Err(AffiliateRejection::Inactive);
    }
    if affiliate.company_relationed != company_id {
        return Err(AffiliateRejection::WrongCompany);
    }
    if affiliate.payout_wallet().is_none() {
        return Err(AffiliateRejection::MissingWallet);
    }
    Ok(())
}
