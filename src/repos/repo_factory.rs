use diesel::connection::AnsiTransactionManager;
use diesel::pg::Pg;
use diesel::Connection;

use models::*;
use repos::legacy_acl::SystemACL;
use repos::*;

pub trait ReposFactory<C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static>: Clone + Send + 'static {
    fn create_promo_codes_repo<'a>(&self, db_conn: &'a C, caller: Option<Caller>) -> Box<PromoCodesRepo + 'a>;
    fn create_promo_codes_repo_with_sys_acl<'a>(&self, db_conn: &'a C) -> Box<PromoCodesRepo + 'a>;
    fn create_orders_repo<'a>(&self, db_conn: &'a C, caller: Option<Caller>) -> Box<OrdersRepo + 'a>;
}

/// Acl of a caller, anonymous callers get `UnauthorizedAcl`
pub fn get_acl<T>(caller: Option<Caller>) -> Box<RepoAcl<T>> {
    match caller {
        Some(caller) => Box::new(ApplicationAcl::new(vec![caller.role], caller.user_id)) as Box<RepoAcl<T>>,
        None => Box::new(UnauthorizedAcl::default()) as Box<RepoAcl<T>>,
    }
}

#[derive(Clone, Default)]
pub struct ReposFactoryImpl;

impl<C: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> ReposFactory<C> for ReposFactoryImpl {
    fn create_promo_codes_repo<'a>(&self, db_conn: &'a C, caller: Option<Caller>) -> Box<PromoCodesRepo + 'a> {
        Box::new(PromoCodesRepoImpl::new(db_conn, get_acl(caller), get_acl(caller))) as Box<PromoCodesRepo>
    }
    fn create_promo_codes_repo_with_sys_acl<'a>(&self, db_conn: &'a C) -> Box<PromoCodesRepo + 'a> {
        Box::new(PromoCodesRepoImpl::new(
            db_conn,
            Box::new(SystemACL::default()) as Box<RepoAcl<PromoCode>>,
            Box::new(SystemACL::default()) as Box<RepoAcl<PromoCodeUsage>>,
        )) as Box<PromoCodesRepo>
    }
    fn create_orders_repo<'a>(&self, db_conn: &'a C, caller: Option<Caller>) -> Box<OrdersRepo + 'a> {
        Box::new(OrdersRepoImpl::new(db_conn, get_acl(caller))) as Box<OrdersRepo>
    }
}
