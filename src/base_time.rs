//! Issuance ("base time") resolution.
//!
//! Given a wall-clock moment, finds the latest forecast issuance that is
//! guaranteed to be published for a product. All arithmetic happens in Korea
//! Standard Time whatever time zone the caller hands in.

use crate::models::{ForecastProduct, ForecastRoundingRule, IssuanceTime, PublishSpeed};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Asia::Seoul;
use tracing::trace;

const NOON_SLOT: u32 = 11;
const NIGHT_SLOT: u32 = 23;

/// Maps "now" onto the forecast issuance to request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseTimeResolver {
    rule: ForecastRoundingRule,
    publish: PublishSpeed,
}

impl BaseTimeResolver {
    #[must_use]
    pub fn new(rule: ForecastRoundingRule, publish: PublishSpeed) -> Self {
        Self { rule, publish }
    }

    #[must_use]
    pub fn for_product(product: ForecastProduct) -> Self {
        Self::new(product.rounding_rule(), product.publish_speed())
    }

    #[must_use]
    pub fn rule(&self) -> ForecastRoundingRule {
        self.rule
    }

    /// Latest published issuance for `now` shifted by `day_offset` days
    /// (0 = today, -1 = yesterday).
    #[must_use]
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>, day_offset: i64) -> IssuanceTime {
        let local = now.with_timezone(&Seoul).naive_local() + Duration::days(day_offset);

        let mut hour = top_of_hour(local);
        if local.minute() < self.publish.ready_minute() {
            hour -= Duration::hours(1);
        }

        let slot = snap(hour, self.rule);
        trace!(?local, ?slot, rule = ?self.rule, "resolved issuance");
        IssuanceTime::from_slot(slot)
    }
}

impl IssuanceTime {
    /// The issuance one interval before this one under `rule`
    #[must_use]
    pub fn previous(&self, rule: ForecastRoundingRule) -> IssuanceTime {
        IssuanceTime::from_slot(align(self.slot() - rule.issuance_interval(), rule))
    }
}

fn top_of_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_time(NaiveTime::MIN) + Duration::hours(i64::from(t.hour()))
}

fn at_hour(t: NaiveDateTime, hour: u32) -> NaiveDateTime {
    t.date().and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour))
}

/// Apply the resolver's rounding step to the publish-adjusted hour
fn snap(hour: NaiveDateTime, rule: ForecastRoundingRule) -> NaiveDateTime {
    match rule {
        ForecastRoundingRule::Daily => at_hour(hour - Duration::days(1), NIGHT_SLOT),
        _ => align(hour, rule),
    }
}

/// Latest valid slot at or before an on-the-hour timestamp
fn align(hour: NaiveDateTime, rule: ForecastRoundingRule) -> NaiveDateTime {
    match rule {
        ForecastRoundingRule::Hourly => hour,
        ForecastRoundingRule::Village => {
            // valid hours satisfy (h + 1) % 3 == 0
            let back = (hour.hour() + 1) % 3;
            hour - Duration::hours(i64::from(back))
        }
        ForecastRoundingRule::Noon => {
            if hour.hour() < NOON_SLOT {
                at_hour(hour - Duration::days(1), NIGHT_SLOT)
            } else if hour.hour() < NIGHT_SLOT {
                at_hour(hour, NOON_SLOT)
            } else {
                at_hour(hour, NIGHT_SLOT)
            }
        }
        ForecastRoundingRule::Daily => {
            if hour.hour() < NIGHT_SLOT {
                at_hour(hour - Duration::days(1), NIGHT_SLOT)
            } else {
                at_hour(hour, NIGHT_SLOT)
            }
        }
    }
}
