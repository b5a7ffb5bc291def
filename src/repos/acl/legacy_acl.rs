//! Access control list traits the repos are checked against
use models::UserId;

/// Decides whether an action on a resource is allowed
pub trait Acl<Resource, Action, Scope, Error, T> {
    fn allows(&self, resource: Resource, action: Action, scope_checker: &CheckScope<Scope, T>, obj: Option<&T>) -> Result<bool, Error>;
}

/// Tells whether an object is in the scope of a user
pub trait CheckScope<Scope, T> {
    fn is_in_scope(&self, user_id: UserId, scope: &Scope, obj: Option<&T>) -> bool;
}

/// SystemACL allows everything, used for internal bookkeeping
#[derive(Clone, Default)]
pub struct SystemACL;

impl<Resource, Action, Scope, Error, T> Acl<Resource, Action, Scope, Error, T> for SystemACL {
    fn allows(&self, _resource: Resource, _action: Action, _scope_checker: &CheckScope<Scope, T>, _obj: Option<&T>) -> Result<bool, Error> {
        Ok(true)
    }
}
