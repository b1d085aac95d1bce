//! Deterministic business rules
//!
//! An ordered list of independent predicates over the raw record. Every
//! predicate runs on every record (no short-circuiting), so one record can
//! accumulate several rule detections. A predicate that cannot evaluate
//! (malformed expiry date, bad coordinates) fails open: that rule is
//! skipped and the rest of the evaluation continues.

pub mod duplicates;

pub use duplicates::duplicate_indices;

use crate::config::RulesConfig;
use crate::types::{Detection, TransactionRecord};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::net::IpAddr;
use tracing::debug;

use crate::features::extractor::parse_timestamp;

/// Amount ceiling for card schemes the acquirer does not support at high
/// value (RUPAY).
const UNSUPPORTED_CARD_LIMIT: f64 = 5000.0;

/// Evaluates the canonical rule set against raw records.
pub struct RuleEngine {
    config: RulesConfig,
}

impl RuleEngine {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    /// Run every predicate and concatenate the detections.
    pub fn evaluate(&self, record: &TransactionRecord) -> Vec<Detection> {
        self.evaluate_at(record, Utc::now())
    }

    /// Same as [`evaluate`](Self::evaluate) with an explicit clock, so
    /// expiry-window behavior is reproducible in tests.
    pub fn evaluate_at(&self, record: &TransactionRecord, now: DateTime<Utc>) -> Vec<Detection> {
        let checks = [
            self.high_amount(record),
            self.currency_mismatch(record),
            self.card_expiring_high_amount(record, now),
            self.invalid_ip_address(record),
            self.geo_location_far(record),
            self.voided_but_settled(record),
            self.late_settlement(record),
            self.amount_mismatch(record),
            self.card_not_supported(record),
            self.amex_inr_mismatch(record),
        ];
        checks.into_iter().flatten().collect()
    }

    fn high_amount(&self, record: &TransactionRecord) -> Option<Detection> {
        (record.amount > self.config.high_amount_threshold).then(|| Detection::rule("high_amount"))
    }

    fn currency_mismatch(&self, record: &TransactionRecord) -> Option<Detection> {
        (!record.terminal_currency.is_empty() && record.currency != record.terminal_currency)
            .then(|| Detection::rule("currency_mismatch"))
    }

    fn card_expiring_high_amount(
        &self,
        record: &TransactionRecord,
        now: DateTime<Utc>,
    ) -> Option<Detection> {
        let expiry = match parse_expiry(&record.card_expire_date) {
            Some(expiry) => expiry,
            None => {
                debug!(
                    transaction_id = %record.transaction_id,
                    raw = %record.card_expire_date,
                    "malformed card expiry, skipping expiry rule"
                );
                return None;
            }
        };
        let window = now.date_naive() + chrono::Days::new(self.config.card_expiry_window_days);
        (expiry <= window && record.amount > self.config.high_amount_threshold)
            .then(|| Detection::rule("card_expiring_high_amount"))
    }

    fn invalid_ip_address(&self, record: &TransactionRecord) -> Option<Detection> {
        let ip: IpAddr = record.ip_address.parse().ok()?;
        let reserved = match ip {
            IpAddr::V4(v4) => {
                v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
            }
            IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
        };
        reserved.then(|| Detection::rule("invalid_ip_address"))
    }

    fn geo_location_far(&self, record: &TransactionRecord) -> Option<Detection> {
        let txn = parse_lat_lon(&record.geo_location)?;
        let home = parse_lat_lon(&self.config.customer_location)?;
        let distance_km = haversine_km(txn, home);
        (distance_km > self.config.geo_radius_km).then(|| {
            Detection::rule(format!("geo_location_far (distance={distance_km:.1} km)"))
        })
    }

    fn voided_but_settled(&self, record: &TransactionRecord) -> Option<Detection> {
        (record.is_voided && record.settlement_status == "SETTLED")
            .then(|| Detection::rule("voided_but_settled"))
    }

    fn late_settlement(&self, record: &TransactionRecord) -> Option<Detection> {
        let completed = parse_timestamp(&record.timestamp_completed)?;
        let settled = parse_timestamp(&record.settlement_timestamp)?;
        let delay_days = (settled - completed).num_seconds() as f64 / 86_400.0;
        (delay_days > self.config.late_settlement_days as f64)
            .then(|| Detection::rule("late_settlement"))
    }

    fn amount_mismatch(&self, record: &TransactionRecord) -> Option<Detection> {
        if record.amount <= 0.0 || record.settled_amount <= 0.0 {
            return None;
        }
        // Settlement should reconcile net of the banking charge.
        let expected = record.amount - record.banking_charge;
        let deviation_pct = ((record.settled_amount - expected).abs() / record.amount) * 100.0;
        (deviation_pct > self.config.amount_mismatch_tolerance_pct)
            .then(|| Detection::rule("amount_mismatch"))
    }

    fn card_not_supported(&self, record: &TransactionRecord) -> Option<Detection> {
        (record.card_type == "RUPAY" && record.amount > UNSUPPORTED_CARD_LIMIT)
            .then(|| Detection::rule("Card not supported"))
    }

    fn amex_inr_mismatch(&self, record: &TransactionRecord) -> Option<Detection> {
        (record.card_type == "AMEX" && record.currency == "INR")
            .then(|| Detection::rule("Currency mismatch"))
    }
}

/// Parse "MM/YYYY" into the last day of that month.
fn parse_expiry(raw: &str) -> Option<NaiveDate> {
    let (month, year) = raw.split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let year: i32 = year.trim().parse().ok()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    next_month.pred_opt()
}

/// Parse a "lat,lon" pair.
fn parse_lat_lon(raw: &str) -> Option<(f64, f64)> {
    let (lat, lon) = raw.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Some((lat, lon))
    } else {
        None
    }
}

/// Great-circle distance in kilometers.
fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn engine() -> RuleEngine {
        RuleEngine::new(RulesConfig::default())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn base_record() -> TransactionRecord {
        let mut r = TransactionRecord::new("tx_rules", 1000.0, "USD");
        r.timestamp_initiated = "2024-03-01T10:00:00Z".to_string();
        r.timestamp_completed = "2024-03-01T10:30:00Z".to_string();
        r.settlement_timestamp = "2024-03-02T10:30:00Z".to_string();
        r
    }

    #[test]
    fn test_clean_record_has_no_detections() {
        assert!(engine().evaluate_at(&base_record(), now()).is_empty());
    }

    #[test]
    fn test_high_amount() {
        let mut r = base_record();
        r.amount = 4500.0;
        r.banking_charge = 45.0;
        r.settled_amount = 4455.0;
        let detections = engine().evaluate_at(&r, now());
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].reason, "high_amount");
    }

    #[test]
    fn test_currency_mismatch() {
        let mut r = base_record();
        r.terminal_currency = "EUR".to_string();
        let detections = engine().evaluate_at(&r, now());
        assert!(detections.iter().any(|d| d.reason == "currency_mismatch"));
    }

    #[test]
    fn test_rules_accumulate() {
        let mut r = base_record();
        r.amount = 4500.0;
        r.banking_charge = 45.0;
        r.settled_amount = 4455.0;
        r.terminal_currency = "EUR".to_string();
        let detections = engine().evaluate_at(&r, now());
        let reasons: Vec<_> = detections.iter().map(|d| d.reason.as_str()).collect();
        assert!(reasons.contains(&"high_amount"));
        assert!(reasons.contains(&"currency_mismatch"));
    }

    #[test]
    fn test_card_expiring_high_amount() {
        let mut r = base_record();
        r.amount = 4500.0;
        r.banking_charge = 45.0;
        r.settled_amount = 4455.0;
        r.card_expire_date = "03/2024".to_string();
        let detections = engine().evaluate_at(&r, now());
        assert!(detections
            .iter()
            .any(|d| d.reason == "card_expiring_high_amount"));
    }

    #[test]
    fn test_malformed_expiry_fails_open() {
        let mut r = base_record();
        r.amount = 4500.0;
        r.banking_charge = 45.0;
        r.settled_amount = 4455.0;
        r.card_expire_date = "garbage".to_string();
        let detections = engine().evaluate_at(&r, now());
        // high_amount still fires; the expiry rule is skipped, not fatal.
        assert!(detections.iter().any(|d| d.reason == "high_amount"));
        assert!(!detections
            .iter()
            .any(|d| d.reason == "card_expiring_high_amount"));
    }

    #[test]
    fn test_private_ip_flagged() {
        let mut r = base_record();
        r.ip_address = "192.168.1.20".to_string();
        let detections = engine().evaluate_at(&r, now());
        assert!(detections.iter().any(|d| d.reason == "invalid_ip_address"));

        r.ip_address = "8.8.8.8".to_string();
        assert!(engine().evaluate_at(&r, now()).is_empty());
    }

    #[test]
    fn test_geo_location_far_carries_distance() {
        let mut r = base_record();
        // Default customer location is Bengaluru; this is Mumbai, ~840 km.
        r.geo_location = "19.0760,72.8777".to_string();
        let detections = engine().evaluate_at(&r, now());
        let geo = detections
            .iter()
            .find(|d| d.reason.starts_with("geo_location_far"))
            .expect("geo rule should fire");
        assert!(geo.reason.contains("km"));
    }

    #[test]
    fn test_nearby_geo_not_flagged() {
        let mut r = base_record();
        r.geo_location = "12.9720,77.5950".to_string();
        assert!(engine().evaluate_at(&r, now()).is_empty());
    }

    #[test]
    fn test_voided_but_settled() {
        let mut r = base_record();
        r.is_voided = true;
        r.settlement_status = "SETTLED".to_string();
        let detections = engine().evaluate_at(&r, now());
        assert!(detections.iter().any(|d| d.reason == "voided_but_settled"));
    }

    #[test]
    fn test_late_settlement() {
        let mut r = base_record();
        r.settlement_timestamp = "2024-03-08T10:30:00Z".to_string();
        let detections = engine().evaluate_at(&r, now());
        assert!(detections.iter().any(|d| d.reason == "late_settlement"));
    }

    #[test]
    fn test_amount_mismatch_beyond_tolerance() {
        let mut r = base_record();
        // 5% skimmed off the settlement, well past the 2% tolerance.
        r.settled_amount = r.amount * 0.95 - r.banking_charge;
        let detections = engine().evaluate_at(&r, now());
        assert!(detections.iter().any(|d| d.reason == "amount_mismatch"));
    }

    #[test]
    fn test_rupay_over_limit() {
        let mut r = base_record();
        r.card_type = "RUPAY".to_string();
        r.amount = 5200.0;
        r.banking_charge = 52.0;
        r.settled_amount = 5148.0;
        let detections = engine().evaluate_at(&r, now());
        assert!(detections.iter().any(|d| d.reason == "Card not supported"));
    }

    #[test]
    fn test_amex_inr_combination() {
        let mut r = base_record();
        r.card_type = "AMEX".to_string();
        r.currency = "INR".to_string();
        r.terminal_currency = "INR".to_string();
        let detections = engine().evaluate_at(&r, now());
        assert!(detections.iter().any(|d| d.reason == "Currency mismatch"));
    }

    #[test]
    fn test_haversine_known_distance() {
        // Bengaluru to Chennai is roughly 290 km.
        let d = haversine_km((12.9716, 77.5946), (13.0827, 80.2707));
        assert!((d - 290.0).abs() < 15.0);
    }

    #[test]
    fn test_parse_expiry_end_of_month() {
        assert_eq!(
            parse_expiry("02/2024"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            parse_expiry("12/2025"),
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
        assert_eq!(parse_expiry("13/2025"), None);
    }
}
