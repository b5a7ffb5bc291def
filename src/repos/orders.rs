//! Orders repo, reads orders and writes the discount columns
use diesel;
use diesel::connection::AnsiTransactionManager;
use diesel::dsl::sum;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_dsl::RunQueryDsl;
use diesel::Connection;
use failure::Error as FailureError;

use errors::{from_diesel, Error};
use models::*;
use repos::acl;
use repos::legacy_acl::CheckScope;
use repos::types::{RepoAcl, RepoResult};
use schema::orders::dsl as Orders;

/// Orders repository, responsible for the discount part of orders
pub struct OrdersRepoImpl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> {
    pub db_conn: &'a T,
    pub acl: Box<RepoAcl<Order>>,
}

pub trait OrdersRepo {
    /// Get order
    fn get(&self, id_arg: OrderId) -> RepoResult<Option<Order>>;

    /// Writes the discount to an order that has none yet, fails with `Error::Conflict` otherwise
    fn apply_discount(&self, id_arg: OrderId, discount: OrderDiscount) -> RepoResult<Order>;

    /// Sum of discounts granted on orders
    fn total_discount(&self) -> RepoResult<f64>;
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> OrdersRepoImpl<'a, T> {
    pub fn new(db_conn: &'a T, acl: Box<RepoAcl<Order>>) -> Self {
        Self { db_conn, acl }
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> OrdersRepo for OrdersRepoImpl<'a, T> {
    fn get(&self, id_arg: OrderId) -> RepoResult<Option<Order>> {
        debug!("Find in orders with id {}.", id_arg);
        let query = Orders::orders.filter(Orders::id.eq(id_arg));
        query
            .get_result(self.db_conn)
            .optional()
            .map_err(From::from)
            .and_then(|value: Option<Order>| {
                if let Some(value) = value.as_ref() {
                    acl::check(&*self.acl, Resource::Orders, Action::Read, self, Some(value))?;
                };

                Ok(value)
            }).map_err(|e: FailureError| e.context(format!("Find order by id: {} error occurred", id_arg)).into())
    }

    fn apply_discount(&self, id_arg: OrderId, discount: OrderDiscount) -> RepoResult<Order> {
        debug!("Apply discount {:?} to order with id {}.", discount, id_arg);
        let query = Orders::orders.find(id_arg);

        query
            .get_result(self.db_conn)
            .map_err(from_diesel)
            .and_then(|value: Order| acl::check(&*self.acl, Resource::Orders, Action::Update, self, Some(&value)))
            .and_then(|_| {
                let filtered = Orders::orders
                    .filter(Orders::id.eq(id_arg))
                    .filter(Orders::discount_code.is_null());
                diesel::update(filtered)
                    .set(&discount)
                    .get_result::<Order>(self.db_conn)
                    .optional()
                    .map_err(From::from)
            }).and_then(|updated| {
                updated.ok_or_else(|| {
                    format_err!("Order {} already has a discount", id_arg)
                        .context(Error::Conflict)
                        .into()
                })
            }).map_err(|e: FailureError| {
                e.context(format!("Apply discount {:?} to order with id {} error occurred", discount, id_arg))
                    .into()
            })
    }

    fn total_discount(&self) -> RepoResult<f64> {
        debug!("Sum discounts of orders.");
        let query = Orders::orders
            .filter(Orders::discount_code.is_not_null())
            .select(sum(Orders::discount_amount));

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, None)
            .and_then(|_| query.get_result::<Option<f64>>(self.db_conn).map_err(From::from))
            .map(|total| total.unwrap_or(0f64))
            .map_err(|e: FailureError| e.context("Sum discounts of orders").into())
    }
}

impl<'a, T: Connection<Backend = Pg, TransactionManager = AnsiTransactionManager> + 'static> CheckScope<Scope, Order> for OrdersRepoImpl<'a, T> {
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
