use crate::{
    error::{ErrorMessage, HttpError},
    models::User,
    resource::{Action, ResourceConfig, Rule},
};

/// Outcome of a single vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Anonymous caller on a rule that needs an identity (401)
    Unauthenticated,
    /// Known caller the rule does not admit (403)
    Forbidden,
}

/// Decide one rule for one caller.
///
/// `subject_user_id` is the account the action targets, when the resource is
/// a user; it is what `RolesOrSelf` compares the caller against. Subjects
/// that do not exist never get here: the handler answers 404 first.
pub fn decide(rule: Rule, actor: Option<&User>, subject_user_id: Option<i64>) -> Decision {
    let actor = match (rule, actor) {
        (Rule::Open, _) => return Decision::Allow,
        (_, None) => return Decision::Unauthenticated,
        (_, Some(actor)) => actor,
    };

    match rule {
        Rule::Open | Rule::Authenticated => Decision::Allow,
        Rule::Roles(roles) => {
            if actor.has_any_role(roles) {
                Decision::Allow
            } else {
                Decision::Forbidden
            }
        }
        Rule::RolesOrSelf(roles) => {
            if actor.has_any_role(roles) || subject_user_id == Some(actor.id) {
                Decision::Allow
            } else {
                Decision::Forbidden
            }
        }
    }
}

/// Run the resource's voter for `action` and turn a denial into 401/403.
pub fn authorize(
    config: &ResourceConfig,
    action: Action,
    actor: Option<&User>,
    subject_user_id: Option<i64>,
) -> Result<(), HttpError> {
    let rule = config.policy.rule(action);
    match decide(rule, actor, subject_user_id) {
        Decision::Allow => Ok(()),
        Decision::Unauthenticated => {
            tracing::warn!(resource = config.route, action = action.to_str(), "anonymous caller denied");
            Err(HttpError::unauthorized(
                ErrorMessage::UserNotAuthenticated.to_string(),
            ))
        }
        Decision::Forbidden => {
            tracing::warn!(
                resource = config.route,
                action = action.to_str(),
                user_id = actor.map(|user| user.id),
                "voter denied access"
            );
            Err(HttpError::forbidden())
        }
    }
}
