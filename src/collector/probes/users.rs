//! Database accounts and their lock state.

use std::sync::Arc;

use async_trait::async_trait;

use super::sql;
use crate::collector::coerce::string_or_empty;
use crate::collector::sample::{MetricDescriptor, SampleSink};
use crate::collector::traits::{Probe, ProbeContext, ProbeError, ProbeGroup};
use crate::storage::{Row, ScanError};

pub const USER_LIST_INFO: &str = "dmdbms_user_list_info";

/// `ACCOUNT_STATUS` of a locked account on a Chinese-locale server.
const LOCKED_ZH: &str = "锁定";

#[derive(Debug)]
struct Account {
    username: String,
    read_only: String,
    status: String,
    expiry_date: String,
    expiry_date_day: String,
    default_tablespace: String,
    profile: String,
    create_time: String,
}

impl Account {
    fn scan(row: &Row) -> Result<Self, ScanError> {
        Ok(Self {
            username: string_or_empty(row.text(0)?),
            read_only: string_or_empty(row.text(1)?),
            status: string_or_empty(row.text(2)?),
            expiry_date: string_or_empty(row.text(3)?),
            expiry_date_day: string_or_empty(row.text(4)?),
            default_tablespace: string_or_empty(row.text(5)?),
            profile: string_or_empty(row.text(6)?),
            create_time: string_or_empty(row.text(7)?),
        })
    }

    fn is_locked(&self) -> bool {
        let status = self.status.trim();
        status == LOCKED_ZH || status.eq_ignore_ascii_case("LOCKED")
    }
}

/// One sample per account: 1 when the account is locked, 0 otherwise.
pub struct UserListProbe {
    desc: Arc<MetricDescriptor>,
}

impl UserListProbe {
    pub fn new() -> Self {
        Self {
            desc: MetricDescriptor::gauge(USER_LIST_INFO, "Information about DM database users, 1 if locked",
                &["host_name", "username", "read_only", "expiry_date", "expiry_date_day",
                  "default_tablespace", "profile", "create_time"]),
        }
    }
}

#[async_trait]
impl Probe for UserListProbe {
    fn name(&self) -> &'static str {
        "user_list"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.desc)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let accounts = ctx
            .executor()
            .execute(ctx.deadline(), sql::USER_LIST, Account::scan)
            .await?;

        let host = ctx.host_name();
        for account in accounts {
            let value = if account.is_locked() { 1.0 } else { 0.0 };
            sink.emit(
                &self.desc,
                [
                    host,
                    account.username.as_str(),
                    account.read_only.as_str(),
                    account.expiry_date.as_str(),
                    account.expiry_date_day.as_str(),
                    account.default_tablespace.as_str(),
                    account.profile.as_str(),
                    account.create_time.as_str(),
                ],
                value,
            );
        }
        Ok(())
    }
}
