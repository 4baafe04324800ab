use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

use crate::{
    try_parse::{null_as_default, skip_invalid},
    Error, Result,
};

/// Query parameters of the current page URL. Keys are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, From)]
#[serde(transparent)]
pub struct UrlParams(HashMap<String, String>);

impl UrlParams {
    /// Parse a query string (with or without the leading `?`). When a key repeats, the last
    /// occurrence wins.
    pub fn parse(query: &str) -> UrlParams {
        let query = query.strip_prefix('?').unwrap_or(query);
        UrlParams(
            form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    /// Value of the parameter `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UrlParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        UrlParams(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Signals visibility rules are evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityContext {
    /// Query parameters of the page URL.
    #[serde(default)]
    pub url_params: UrlParams,
    /// Referrer of the current page view, empty when there is none.
    #[serde(default)]
    pub referrer: String,
}

impl VisibilityContext {
    /// Build the context from parsed parameters.
    pub fn new(url_params: impl Into<UrlParams>, referrer: impl Into<String>) -> Self {
        VisibilityContext {
            url_params: url_params.into(),
            referrer: referrer.into(),
        }
    }

    /// Build the context from a bare query string.
    pub fn from_query(query: &str, referrer: impl Into<String>) -> Self {
        VisibilityContext::new(UrlParams::parse(query), referrer)
    }

    /// Build the context from the full URL of the page being viewed.
    pub fn from_url(url: &str, referrer: impl Into<String>) -> Result<Self> {
        let url = Url::parse(url).map_err(Error::InvalidUrl)?;
        Ok(VisibilityContext::from_query(
            url.query().unwrap_or_default(),
            referrer,
        ))
    }
}

/// Conditional visibility configured on a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRules {
    /// Disabled rules never hide the block.
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
    /// Missing logic reads as [`VisibilityLogic::ShowIfAny`].
    #[serde(default, deserialize_with = "null_as_default")]
    pub logic: VisibilityLogic,
    /// Conditions that fail to parse are skipped, same as invalid ones.
    #[serde(default, deserialize_with = "skip_invalid")]
    pub conditions: Vec<Condition>,
}

/// How condition results combine into a show/hide decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityLogic {
    /// Show if at least one condition matches.
    #[default]
    ShowIfAny,
    /// Show only if every condition matches.
    ShowIfAll,
    /// Hide if at least one condition matches.
    HideIfAny,
    /// Hide only if every condition matches.
    HideIfAll,
    /// Unrecognized logic. Blocks with unknown logic are always shown.
    #[serde(other)]
    Unknown,
}

/// A single check of one signal against a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Editor-assigned id. Not used in evaluation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Signal to inspect.
    pub field: ConditionField,
    /// Query parameter name, used only with [`ConditionField::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_field: Option<String>,
    /// Comparison applied to the signal.
    pub operator: ConditionOperator,
    /// Value to compare against. Ignored by presence operators.
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

/// Signal a condition inspects. Named fields read the query parameter of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    /// `utm_source`
    UtmSource,
    /// `utm_medium`
    UtmMedium,
    /// `utm_campaign`
    UtmCampaign,
    /// `utm_term`
    UtmTerm,
    /// `utm_content`
    UtmContent,
    /// Google Ads click id.
    Gclid,
    /// Meta click id.
    Fbclid,
    /// TikTok click id.
    Ttclid,
    /// Referrer of the page view rather than a query parameter.
    Referrer,
    /// Arbitrary query parameter named by [`Condition::custom_field`].
    Custom,
    /// Unrecognized field. Conditions on it are invalid.
    #[serde(other)]
    Unknown,
}

impl ConditionField {
    /// Query parameter name for the named fields.
    fn param_name(self) -> Option<&'static str> {
        Some(match self {
            Self::UtmSource => "utm_source",
            Self::UtmMedium => "utm_medium",
            Self::UtmCampaign => "utm_campaign",
            Self::UtmTerm => "utm_term",
            Self::UtmContent => "utm_content",
            Self::Gclid => "gclid",
            Self::Fbclid => "fbclid",
            Self::Ttclid => "ttclid",
            Self::Referrer | Self::Custom | Self::Unknown => return None,
        })
    }
}

/// Comparison of a signal against a condition value. Text comparisons ignore case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Signal equals the value.
    Equals,
    /// Signal differs from the value.
    NotEquals,
    /// Signal contains the value.
    Contains,
    /// Signal does not contain the value.
    NotContains,
    /// Signal begins with the value.
    StartsWith,
    /// Signal is present and non-empty.
    Exists,
    /// Signal is absent or empty.
    NotExists,
    /// Unrecognized operator. Conditions using it are invalid.
    #[serde(other)]
    Unknown,
}

impl VisibilityRules {
    /// Decide whether the block is shown in `context`.
    ///
    /// Rules that are disabled, empty, or contain no valid condition never hide anything.
    pub fn eval(&self, context: &VisibilityContext) -> bool {
        if !self.enabled || self.conditions.is_empty() {
            return true;
        }

        let results: Vec<bool> = self
            .conditions
            .iter()
            .filter(|condition| condition.is_valid())
            .map(|condition| condition.eval(context))
            .collect();
        if results.is_empty() {
            return true;
        }

        let any = results.iter().any(|&it| it);
        let all = results.iter().all(|&it| it);
        match self.logic {
            VisibilityLogic::ShowIfAny => any,
            VisibilityLogic::ShowIfAll => all,
            VisibilityLogic::HideIfAny => !any,
            VisibilityLogic::HideIfAll => !all,
            VisibilityLogic::Unknown => true,
        }
    }
}

/// Decide whether a block with optional `rules` is shown in `context`.
pub fn is_block_visible(rules: Option<&VisibilityRules>, context: &VisibilityContext) -> bool {
    rules.map_or(true, |rules| rules.eval(context))
}

impl Condition {
    /// A condition takes part in evaluation only if it has a value (unless the operator only
    /// checks presence) and, for custom fields, a parameter name. Unrecognized fields and
    /// operators are never valid.
    pub fn is_valid(&self) -> bool {
        let has_value = matches!(
            self.operator,
            ConditionOperator::Exists | ConditionOperator::NotExists
        ) || !self.value.trim().is_empty();
        let has_field = match self.field {
            ConditionField::Custom => self
                .custom_field
                .as_deref()
                .is_some_and(|it| !it.trim().is_empty()),
            ConditionField::Unknown => false,
            _ => true,
        };
        has_value && has_field && self.operator != ConditionOperator::Unknown
    }

    fn field_value<'c>(&self, context: &'c VisibilityContext) -> Option<&'c str> {
        match self.field {
            ConditionField::Referrer => Some(context.referrer.as_str()),
            ConditionField::Custom => context.url_params.get(self.custom_field.as_deref()?),
            field => context.url_params.get(field.param_name()?),
        }
    }

    fn eval(&self, context: &VisibilityContext) -> bool {
        self.operator.eval(self.field_value(context), &self.value)
    }
}

impl ConditionOperator {
    /// Apply the operator to a field value. Text comparisons are case-insensitive and treat a
    /// missing field as the empty string.
    fn eval(&self, field_value: Option<&str>, condition_value: &str) -> bool {
        let present = field_value.is_some_and(|it| !it.is_empty());
        let actual = field_value.unwrap_or_default().to_lowercase();
        let expected = condition_value.to_lowercase();

        match self {
            Self::Equals => actual == expected,
            Self::NotEquals => actual != expected,
            Self::Contains => actual.contains(&expected),
            Self::NotContains => !actual.contains(&expected),
            Self::StartsWith => actual.starts_with(&expected),
            Self::Exists => present,
            Self::NotExists => !present,
            Self::Unknown => false,
        }
    }
}
