//! Admin-curated catalog of loan interest-rate options.
//!
//! Loans copy the percent at creation, so editing or retiring an option
//! never rewrites history.

use kopera_domain::{AccessPolicy, Actor, InterestRateOption, RateOptionId};
use rust_decimal::Decimal;

use crate::{
    error::{CoreError, EntityKind},
    ports::{NewRateOption, RateCatalog},
};

/// Partial update. `None` leaves the field unchanged.
#[derive(Clone, Debug, Default)]
pub struct RateOptionPatch {
    pub name: Option<String>,
    pub percent: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Clone, Copy)]
pub struct RateBook<'a> {
    catalog: &'a dyn RateCatalog,
    policy: &'a AccessPolicy,
}

impl<'a> RateBook<'a> {
    pub fn new(catalog: &'a dyn RateCatalog, policy: &'a AccessPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn create(
        &self,
        actor: &Actor,
        name: &str,
        percent: Decimal,
        description: &str,
    ) -> Result<InterestRateOption, CoreError> {
        self.ensure_admin(actor)?;
        if percent <= Decimal::ZERO {
            return Err(CoreError::InvalidAmount);
        }
        self.catalog
            .insert(NewRateOption {
                name: name.to_owned(),
                percent,
                description: description.to_owned(),
                active: true,
                created_by: actor.id,
            })
            .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))
    }

    pub fn get(&self, id: RateOptionId) -> Result<InterestRateOption, CoreError> {
        self.catalog
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))
    }

    /// Options currently offered to borrowers.
    pub fn active(&self) -> Vec<InterestRateOption> {
        self.catalog.active()
    }

    pub fn all(&self, actor: &Actor) -> Result<Vec<InterestRateOption>, CoreError> {
        self.ensure_admin(actor)?;
        Ok(self.catalog.all())
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: RateOptionId,
        patch: RateOptionPatch,
    ) -> Result<InterestRateOption, CoreError> {
        self.ensure_admin(actor)?;
        let mut option = self
            .catalog
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))?;

        if let Some(percent) = patch.percent {
            if percent <= Decimal::ZERO {
                return Err(CoreError::InvalidAmount);
            }
            option.percent = percent;
        }
        if let Some(name) = patch.name {
            option.name = name;
        }
        if let Some(description) = patch.description {
            option.description = description;
        }

        self.catalog
            .update(&option)
            .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))?;
        Ok(option)
    }

    /// Retires or re-offers an option without touching loans that copied it.
    pub fn set_active(
        &self,
        actor: &Actor,
        id: RateOptionId,
        active: bool,
    ) -> Result<InterestRateOption, CoreError> {
        self.ensure_admin(actor)?;
        let mut option = self
            .catalog
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))?;
        option.active = active;
        self.catalog
            .update(&option)
            .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))?;
        Ok(option)
    }

    pub fn delete(&self, actor: &Actor, id: RateOptionId) -> Result<(), CoreError> {
        self.ensure_admin(actor)?;
        self.catalog
            .get(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))?;
        self.catalog
            .remove(id)
            .map_err(|err| CoreError::from_store(err, EntityKind::RateOption))
    }

    fn ensure_admin(&self, actor: &Actor) -> Result<(), CoreError> {
        if self.policy.is_admin(actor) {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }
}
