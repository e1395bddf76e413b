//! Promo code statistics, reduced in memory from two narrow table scans.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::models::{CodeStatRow, CodeType, Region, RequestStatRow};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    /// Redemption requests an admin has verified
    pub verified: u64,
    /// Verified requests created this calendar month (UTC) times the unit price
    pub monthly_revenue: u64,
    pub by_type: BTreeMap<CodeType, u64>,
    pub by_region: BTreeMap<Region, u64>,
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

pub fn aggregate(
    codes: &[CodeStatRow],
    requests: &[RequestStatRow],
    now: DateTime<Utc>,
    unit_price: u64,
) -> PromoCodeStats {
    // Every known bucket is reported, even when empty
    let mut by_type: BTreeMap<CodeType, u64> = CodeType::ALL.iter().map(|t| (*t, 0)).collect();
    let mut by_region: BTreeMap<Region, u64> = Region::ALL.iter().map(|r| (*r, 0)).collect();
    let mut used = 0;

    for code in codes {
        if code.is_used {
            used += 1;
        }
        *by_type.entry(code.code_type).or_default() += 1;
        *by_region.entry(code.region).or_default() += 1;
    }

    let total = codes.len() as u64;
    let verified = requests.iter().filter(|r| r.verified).count() as u64;
    let verified_this_month = requests
        .iter()
        .filter(|r| r.verified && same_month(r.created_at, now))
        .count() as u64;

    PromoCodeStats {
        total,
        used,
        available: total - used,
        verified,
        monthly_revenue: verified_this_month * unit_price,
        by_type,
        by_region,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn code(code_type: CodeType, region: Region, is_used: bool) -> CodeStatRow {
        CodeStatRow {
            code_type,
            region,
            is_used,
        }
    }

    fn request(verified: bool, created_at: DateTime<Utc>) -> RequestStatRow {
        RequestStatRow {
            verified,
            created_at,
        }
    }

    #[test]
    fn totals_and_histograms_agree() {
        let codes = vec![
            code(CodeType::Starter, Region::Americas, true),
            code(CodeType::Starter, Region::Emea, false),
            code(CodeType::Standard, Region::AsiaPacific, false),
            code(CodeType::Standard, Region::AsiaPacific, true),
            code(CodeType::Standard, Region::Americas, false),
        ];
        let stats = aggregate(&codes, &[], Utc::now(), 15);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.total, stats.used + stats.available);
        assert_eq!(stats.by_type.values().sum::<u64>(), stats.total);
        assert_eq!(stats.by_region.values().sum::<u64>(), stats.total);
        assert_eq!(stats.by_type[&CodeType::Standard], 3);
        assert_eq!(stats.by_region[&Region::AsiaPacific], 2);
    }

    #[test]
    fn empty_tables_report_zeroed_buckets() {
        let stats = aggregate(&[], &[], Utc::now(), 15);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.by_type.len(), 2);
        assert_eq!(stats.by_region.len(), 3);
        assert_eq!(stats.monthly_revenue, 0);
    }

    #[test]
    fn revenue_counts_verified_requests_in_current_month() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let requests = vec![
            request(true, now - Duration::days(2)),
            request(true, now - Duration::days(1)),
            request(false, now),
            // last month
            request(true, Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap()),
            // same month, previous year
            request(true, Utc.with_ymd_and_hms(2023, 3, 10, 0, 0, 0).unwrap()),
        ];

        let stats = aggregate(&[], &requests, now, 15);
        assert_eq!(stats.verified, 4);
        assert_eq!(stats.monthly_revenue, 30);

        let priced = aggregate(&[], &requests, now, 20);
        assert_eq!(priced.monthly_revenue, 40);
    }

    #[test]
    fn histogram_keys_serialize_as_wire_names() {
        let codes = vec![code(CodeType::Starter, Region::AsiaPacific, false)];
        let json = serde_json::to_value(aggregate(&codes, &[], Utc::now(), 15)).unwrap();
        assert_eq!(json["byRegion"]["asia-pacific"], 1);
        assert_eq!(json["byType"]["starter"], 1);
        assert_eq!(json["monthlyRevenue"], 0);
    }
}
