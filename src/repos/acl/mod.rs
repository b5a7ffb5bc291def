//! Repos is a module responsible for interacting with access control lists
//! Authorization module contains authorization logic for the repo layer app

#[macro_use]
pub mod macros;
pub mod legacy_acl;

use std::collections::HashMap;
use std::rc::Rc;

use errors::Error;
use failure::Error as FailureError;

use self::legacy_acl::{Acl, CheckScope};

use models::authorization::*;
use models::UserId;

pub fn check<T>(
    acl: &Acl<Resource, Action, Scope, FailureError, T>,
    resource: Resource,
    action: Action,
    scope_checker: &CheckScope<Scope, T>,
    obj: Option<&T>,
) -> Result<(), FailureError> {
    acl.allows(resource, action, scope_checker, obj).and_then(|allowed| {
        if allowed {
            Ok(())
        } else {
            Err(format_err!("Denied request to do {:?} on {:?}", action, resource)
                .context(Error::Forbidden)
                .into())
        }
    })
}

/// ApplicationAcl contains main logic for manipulation with resources
#[derive(Clone)]
pub struct ApplicationAcl {
    acls: Rc<HashMap<Role, Vec<Permission>>>,
    roles: Vec<Role>,
    user_id: UserId,
}

impl ApplicationAcl {
    pub fn new(roles: Vec<Role>, user_id: UserId) -> Self {
        let mut hash = ::std::collections::HashMap::new();
        hash.insert(
            Role::Admin,
            vec![
                permission!(Resource::PromoCodes),
                permission!(Resource::PromoCodeUsages),
                permission!(Resource::Orders),
            ],
        );
        hash.insert(
            Role::Customer,
            vec![
                permission!(Resource::PromoCodes, Action::Read),
                permission!(Resource::PromoCodeUsages, Action::Read, Scope::Owned),
                permission!(Resource::Orders, Action::Read, Scope::Owned),
                permission!(Resource::Orders, Action::Update, Scope::Owned),
            ],
        );

        ApplicationAcl {
            acls: Rc::new(hash),
            roles,
            user_id,
        }
    }
}

impl<T> Acl<Resource, Action, Scope, FailureError, T> for ApplicationAcl {
    fn allows(&self, resource: Resource, action: Action, scope_checker: &CheckScope<Scope, T>, obj: Option<&T>) -> Result<bool, FailureError> {
        let empty: Vec<Permission> = Vec::new();
        let user_id = &self.user_id;
        let hashed_acls = self.acls.clone();
        let mut acls = self
            .roles
            .iter()
            .flat_map(|role| hashed_acls.get(role).unwrap_or(&empty))
            .filter(|permission| (permission.resource == resource) && ((permission.action == action) || (permission.action == Action::All)))
            .filter(|permission| scope_checker.is_in_scope(*user_id, &permission.scope, obj));

        if acls.next().is_some() {
            Ok(true)
        } else {
            error!("Denied request from user {} to do {} on {}.", user_id, action, resource);
            Ok(false)
        }
    }
}

/// UnauthorizedAcl contains main logic for manipulation with resources
#[derive(Clone, Default)]
pub struct UnauthorizedAcl;

impl<T> Acl<Resource, Action, Scope, FailureError, T> for UnauthorizedAcl {
    fn allows(&self, resource: Resource, action: Action, _scope_checker: &CheckScope<Scope, T>, _obj: Option<&T>) -> Result<bool, FailureError> {
        if action == Action::Read && resource == Resource::PromoCodes {
            Ok(true)
        } else {
            error!("Denied unauthorized request to do {} on {}.", action, resource);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use failure::Error as FailureError;

    use models::*;
    use repos::legacy_acl::{Acl, CheckScope};

    use super::*;

    fn create_order(user_id: UserId) -> Order {
        Order {
            id: OrderId(1),
            user_id,
            total: 100f64,
            discount_code: None,
            discount_type: None,
            discount_value: None,
            discount_amount: None,
            final_total: None,
        }
    }

    fn create_usage(user_id: UserId) -> PromoCodeUsage {
        PromoCodeUsage {
            promo_code_id: PromoCodeId(1),
            user_id,
            count: 1,
            used_at: SystemTime::now(),
        }
    }

    #[derive(Default)]
    struct ScopeChecker;

    impl CheckScope<Scope, Order> for ScopeChecker {
        fn is_in_scope(&self, user_id: UserId, scope: &Scope, obj: Option<&Order>) -> bool {
            match *scope {
                Scope::All => true,
                Scope::Owned => {
                    if let Some(order) = obj {
                        order.user_id == user_id
                    } else {
                        false
                    }
                }
            }
        }
    }

    impl CheckScope<Scope, PromoCodeUsage> for ScopeChecker {
        fn is_in_scope(&self, user_id: UserId, scope: &Scope, obj: Option<&PromoCodeUsage>) -> bool {
            match *scope {
                Scope::All => true,
                Scope::Owned => obj.map(|usage| usage.user_id == user_id).unwrap_or(false),
            }
        }
    }

    impl CheckScope<Scope, PromoCode> for ScopeChecker {
        fn is_in_scope(&self, _user_id: UserId, scope: &Scope, _obj: Option<&PromoCode>) -> bool {
            *scope == Scope::All
        }
    }

    fn allows<T>(acl: &Acl<Resource, Action, Scope, FailureError, T>, resource: Resource, action: Action, obj: Option<&T>) -> bool
    where
        ScopeChecker: CheckScope<Scope, T>,
    {
        acl.allows(resource, action, &ScopeChecker::default(), obj).unwrap()
    }

    #[test]
    fn test_admin_for_promo_codes() {
        let acl = ApplicationAcl::new(vec![Role::Admin], UserId(1));

        for action in &[Action::Read, Action::Create, Action::Update, Action::Delete] {
            assert!(
                allows::<PromoCode>(&acl, Resource::PromoCodes, *action, None),
                "ACL does not allow {} on promo codes for admin.",
                action
            );
        }
        assert!(allows(&acl, Resource::Orders, Action::Update, Some(&create_order(UserId(2)))));
    }

    #[test]
    fn test_customer_for_promo_codes() {
        let acl = ApplicationAcl::new(vec![Role::Customer], UserId(2));

        assert!(allows::<PromoCode>(&acl, Resource::PromoCodes, Action::Read, None));
        assert!(!allows::<PromoCode>(&acl, Resource::PromoCodes, Action::Create, None));
        assert!(!allows::<PromoCode>(&acl, Resource::PromoCodes, Action::Update, None));
        assert!(!allows::<PromoCode>(&acl, Resource::PromoCodes, Action::Delete, None));
    }

    #[test]
    fn test_customer_for_own_records() {
        let user_id = UserId(2);
        let acl = ApplicationAcl::new(vec![Role::Customer], user_id);

        assert!(allows(&acl, Resource::Orders, Action::Update, Some(&create_order(user_id))));
        assert!(!allows(&acl, Resource::Orders, Action::Update, Some(&create_order(UserId(3)))));
        assert!(allows(&acl, Resource::PromoCodeUsages, Action::Read, Some(&create_usage(user_id))));
        assert!(!allows(&acl, Resource::PromoCodeUsages, Action::Read, Some(&create_usage(UserId(3)))));
        assert!(!allows(&acl, Resource::PromoCodeUsages, Action::Create, Some(&create_usage(user_id))));
    }

    #[test]
    fn test_unauthorized_reads_promo_codes_only() {
        let acl = UnauthorizedAcl::default();

        assert!(allows::<PromoCode>(&acl, Resource::PromoCodes, Action::Read, None));
        assert!(!allows::<PromoCode>(&acl, Resource::PromoCodes, Action::Update, None));
        assert!(!allows(&acl, Resource::Orders, Action::Read, Some(&create_order(UserId(1)))));
    }

    #[test]
    fn test_denied_check_is_forbidden() {
        let acl = UnauthorizedAcl::default();
        let err = check::<PromoCode>(&acl, Resource::PromoCodes, Action::Delete, &ScopeChecker::default(), None).unwrap_err();
        assert_eq!(Error::kind_of(&err).map(Error::code), Some(403));
    }
}
