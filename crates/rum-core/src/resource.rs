//! Resource timing interpretation.
//!
//! Turns a raw [`TimingRecord`] into phase metrics, resolves its duration,
//! classifies it, and decides whether a request should be reported at all.
//!
//! # Validation
//!
//! Browsers regularly hand out entries that cannot be trusted: cross-origin
//! loads without `Timing-Allow-Origin` are zeroed except for a couple of
//! fields, and some engines report corrupt orderings. Phases are computed
//! relative to each other, so one bad anchor poisons the rest. Any
//! inconsistency therefore rejects the whole record.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::configuration::Configuration;
use crate::session::SessionState;
use crate::timing::{ComputedResourceDetails, PhaseMetric, TimingRecord, available, ms_to_ns};

/// Why a record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inconsistency {
    NoDetailedTimings,
    ConnectStartAfterConnectEnd,
    DomainLookupStartAfterDomainLookupEnd,
    ResponseStartAfterResponseEnd,
    RequestStartAfterResponseStart,
    RedirectStartAfterRedirectEnd,
    SecureConnectionStartAfterConnectEnd,
}

impl Inconsistency {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NoDetailedTimings => "no detailed timings",
            Self::ConnectStartAfterConnectEnd => "connectStart > connectEnd",
            Self::DomainLookupStartAfterDomainLookupEnd => {
                "domainLookupStart > domainLookupEnd"
            }
            Self::ResponseStartAfterResponseEnd => "responseStart > responseEnd",
            Self::RequestStartAfterResponseStart => "requestStart > responseStart",
            Self::RedirectStartAfterRedirectEnd => "redirectStart > redirectEnd",
            Self::SecureConnectionStartAfterConnectEnd => "secureConnectionStart > connectEnd",
        }
    }
}

/// `start > end`, skipped when either side is unavailable.
fn reversed(start: f64, end: f64) -> bool {
    matches!((available(start), available(end)), (Some(start), Some(end)) if start > end)
}

/// The instant time-to-first-byte is measured from.
fn request_anchor(entry: &TimingRecord) -> f64 {
    available(entry.request_start).unwrap_or(entry.fetch_start)
}

fn find_inconsistency(entry: &TimingRecord) -> Option<Inconsistency> {
    if available(entry.response_start).is_none() {
        return Some(Inconsistency::NoDetailedTimings);
    }

    let checks = [
        (
            reversed(entry.connect_start, entry.connect_end),
            Inconsistency::ConnectStartAfterConnectEnd,
        ),
        (
            reversed(entry.domain_lookup_start, entry.domain_lookup_end),
            Inconsistency::DomainLookupStartAfterDomainLookupEnd,
        ),
        (
            entry.response_start > entry.response_end,
            Inconsistency::ResponseStartAfterResponseEnd,
        ),
        (
            request_anchor(entry) > entry.response_start,
            Inconsistency::RequestStartAfterResponseStart,
        ),
        (
            reversed(entry.redirect_start, entry.redirect_end),
            Inconsistency::RedirectStartAfterRedirectEnd,
        ),
        (
            reversed(entry.secure_connection_start, entry.connect_end),
            Inconsistency::SecureConnectionStartAfterConnectEnd,
        ),
    ];

    checks
        .into_iter()
        .find_map(|(failed, reason)| failed.then_some(reason))
}

/// Derives phase metrics from a timing record.
///
/// Returns `None` when the record is not computable. That is an expected
/// outcome (cross-origin entries, corrupt orderings), not a failure.
pub fn compute_performance_resource_details(
    entry: &TimingRecord,
) -> Option<ComputedResourceDetails> {
    if let Some(reason) = find_inconsistency(entry) {
        tracing::debug!(
            name = %entry.name,
            reason = reason.as_str(),
            "resource timing not computable"
        );
        return None;
    }

    let origin = entry.start_time;
    let fetch_start = entry.fetch_start;

    let connect = match (available(entry.connect_start), available(entry.connect_end)) {
        (Some(start), Some(end)) if !same_instant(start, fetch_start) && !same_instant(start, end) => {
            Some(PhaseMetric::between(origin, start, end))
        }
        _ => None,
    };

    // TLS happens inside the connection; a reused connection has neither.
    let ssl = connect.and_then(|_| {
        available(entry.secure_connection_start)
            .map(|start| PhaseMetric::between(origin, start, entry.connect_end))
    });

    let dns = match (
        available(entry.domain_lookup_start),
        available(entry.domain_lookup_end),
    ) {
        (Some(start), Some(end)) if !same_instant(start, fetch_start) => {
            Some(PhaseMetric::between(origin, start, end))
        }
        _ => None,
    };

    let request_start = request_anchor(entry);

    Some(ComputedResourceDetails {
        redirect: redirect_phase(entry),
        dns,
        connect,
        ssl,
        first_byte: PhaseMetric::between(origin, request_start, entry.response_start),
        download: PhaseMetric::between(origin, entry.response_start, entry.response_end),
    })
}

fn redirect_phase(entry: &TimingRecord) -> Option<PhaseMetric> {
    let origin = entry.start_time;
    match (available(entry.redirect_start), available(entry.redirect_end)) {
        (Some(start), end) => {
            // Some engines drop redirectEnd on cross-origin hops.
            let end = end.unwrap_or(entry.fetch_start);
            (end >= start).then(|| PhaseMetric::between(origin, start, end))
        }
        // Redirect timing is same-origin restricted: approximate it with the
        // time spent before fetching began.
        (None, None) if entry.fetch_start > entry.start_time => Some(PhaseMetric::between(
            origin,
            entry.start_time,
            entry.fetch_start,
        )),
        (None, _) => None,
    }
}

#[expect(clippy::float_cmp, reason = "browsers copy timestamps verbatim to signal reuse")]
fn same_instant(a: f64, b: f64) -> bool {
    a == b
}

/// Resolves the duration of a load in nanoseconds.
///
/// Some browsers zero `duration` for cross-origin entries while still
/// exposing coarse bounds; fall back to `responseEnd - startTime` then.
pub fn compute_performance_resource_duration(entry: &TimingRecord) -> i64 {
    available(entry.duration).map_or_else(
        || ms_to_ns(entry.response_end - entry.start_time),
        ms_to_ns,
    )
}

/// Decides whether a request should be reported.
///
/// Requests to the agent's own intake endpoints are dropped so uploads never
/// monitor themselves, and so is everything once the session's resource
/// sampling gate is closed. `is_tracked` is not consulted: the
/// resource gate is sampled independently.
pub fn should_track_resource(
    url: &str,
    configuration: &Configuration,
    session: &impl SessionState,
) -> bool {
    let keep = !configuration.is_intake_url(url) && session.is_tracked_with_resource();
    tracing::trace!(url, keep, "resource tracking decision");
    keep
}

/// Resource categories reported to the intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Xhr,
    Fetch,
    Beacon,
    Css,
    Js,
    Image,
    Font,
    Media,
    Other,
}

impl ResourceKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Xhr => "xhr",
            Self::Fetch => "fetch",
            Self::Beacon => "beacon",
            Self::Css => "css",
            Self::Js => "js",
            Self::Image => "image",
            Self::Font => "font",
            Self::Media => "media",
            Self::Other => "other",
        }
    }

    /// Whether the load was issued by script and is reported by request
    /// collection instead.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(self, Self::Xhr | Self::Fetch)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a record by initiator first, then by URL extension.
pub fn compute_resource_kind(entry: &TimingRecord) -> ResourceKind {
    let initiator = entry.initiator_type.as_str();
    match initiator {
        "xmlhttprequest" => return ResourceKind::Xhr,
        "fetch" => return ResourceKind::Fetch,
        "beacon" => return ResourceKind::Beacon,
        "image" | "img" | "icon" => return ResourceKind::Image,
        "audio" | "video" => return ResourceKind::Media,
        _ => {}
    }

    let extension = Url::parse(&entry.name)
        .ok()
        .and_then(|url| {
            url.path()
                .rsplit_once('.')
                .map(|(_, extension)| extension.to_ascii_lowercase())
        })
        .unwrap_or_default();

    match extension.as_str() {
        "css" => ResourceKind::Css,
        "js" => ResourceKind::Js,
        "gif" | "jpg" | "jpeg" | "tiff" | "png" | "svg" | "ico" => ResourceKind::Image,
        "woff" | "eot" | "woff2" | "ttf" => ResourceKind::Font,
        "mp4" | "webm" => ResourceKind::Media,
        _ => ResourceKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::configuration::{BuildEnv, UserConfiguration};
    use crate::types::SessionId;

    fn generate_resource_with(overrides: impl FnOnce(&mut TimingRecord)) -> TimingRecord {
        let mut record = TimingRecord {
            connect_end: 17.0,
            connect_start: 15.0,
            domain_lookup_end: 14.0,
            domain_lookup_start: 13.0,
            duration: 50.0,
            entry_type: "resource".to_string(),
            fetch_start: 12.0,
            name: "entry".to_string(),
            redirect_end: 11.0,
            redirect_start: 10.0,
            request_start: 20.0,
            response_end: 60.0,
            response_start: 50.0,
            secure_connection_start: 16.0,
            start_time: 10.0,
            initiator_type: String::new(),
        };
        overrides(&mut record);
        record
    }

    fn phase(start: i64, duration: i64) -> PhaseMetric {
        PhaseMetric { start, duration }
    }

    fn full_details() -> ComputedResourceDetails {
        ComputedResourceDetails {
            connect: Some(phase(5_000_000, 2_000_000)),
            dns: Some(phase(3_000_000, 1_000_000)),
            download: phase(40_000_000, 10_000_000),
            first_byte: phase(10_000_000, 30_000_000),
            redirect: Some(phase(0, 1_000_000)),
            ssl: Some(phase(6_000_000, 1_000_000)),
        }
    }

    // ========== compute_performance_resource_details ==========

    #[test]
    fn should_not_compute_entry_without_detailed_timings() {
        let entry = generate_resource_with(|r| {
            r.connect_end = 0.0;
            r.connect_start = 0.0;
            r.domain_lookup_end = 0.0;
            r.domain_lookup_start = 0.0;
            r.redirect_end = 0.0;
            r.redirect_start = 0.0;
            r.request_start = 0.0;
            r.response_start = 0.0;
            r.secure_connection_start = 0.0;
        });
        assert_eq!(compute_performance_resource_details(&entry), None);
    }

    #[test]
    fn should_compute_timings_from_entry() {
        let entry = generate_resource_with(|_| {});
        assert_eq!(
            compute_performance_resource_details(&entry),
            Some(full_details())
        );
    }

    #[test]
    fn computing_twice_yields_identical_output() {
        let entry = generate_resource_with(|_| {});
        assert_eq!(
            compute_performance_resource_details(&entry),
            compute_performance_resource_details(&entry)
        );
    }

    #[test]
    fn should_not_compute_redirect_timing_when_no_redirect() {
        let entry = generate_resource_with(|r| {
            r.fetch_start = 10.0;
            r.redirect_end = 0.0;
            r.redirect_start = 0.0;
        });
        assert_eq!(
            compute_performance_resource_details(&entry),
            Some(ComputedResourceDetails {
                redirect: None,
                ..full_details()
            })
        );
    }

    #[test]
    fn should_not_compute_dns_timing_when_persistent_connection_or_cache() {
        let entry = generate_resource_with(|r| {
            r.domain_lookup_end = 12.0;
            r.domain_lookup_start = 12.0;
            r.fetch_start = 12.0;
        });
        assert_eq!(
            compute_performance_resource_details(&entry),
            Some(ComputedResourceDetails {
                dns: None,
                ..full_details()
            })
        );
    }

    #[test]
    fn dns_is_omitted_whenever_lookup_starts_at_fetch_start() {
        // Lookup end differs, but the lookup anchor still signals reuse.
        let entry = generate_resource_with(|r| {
            r.domain_lookup_start = 12.0;
            r.domain_lookup_end = 13.0;
        });
        let details = compute_performance_resource_details(&entry).unwrap();
        assert_eq!(details.dns, None);
        assert!(details.connect.is_some());
    }

    #[test]
    fn should_not_compute_ssl_timing_when_no_secure_connection() {
        let entry = generate_resource_with(|r| r.secure_connection_start = 0.0);
        assert_eq!(
            compute_performance_resource_details(&entry),
            Some(ComputedResourceDetails {
                ssl: None,
                ..full_details()
            })
        );
    }

    #[test]
    fn should_not_compute_ssl_timing_when_persistent_connection() {
        let entry = generate_resource_with(|r| {
            r.connect_end = 12.0;
            r.connect_start = 12.0;
            r.domain_lookup_end = 12.0;
            r.domain_lookup_start = 12.0;
            r.fetch_start = 12.0;
            r.secure_connection_start = 12.0;
        });
        assert_eq!(
            compute_performance_resource_details(&entry),
            Some(ComputedResourceDetails {
                connect: None,
                dns: None,
                ssl: None,
                ..full_details()
            })
        );
    }

    #[test]
    fn should_not_compute_connect_timing_when_persistent_connection() {
        let entry = generate_resource_with(|r| {
            r.connect_end = 12.0;
            r.connect_start = 12.0;
            r.domain_lookup_end = 12.0;
            r.domain_lookup_start = 12.0;
            r.fetch_start = 12.0;
            r.secure_connection_start = 0.0;
        });
        assert_eq!(
            compute_performance_resource_details(&entry),
            Some(ComputedResourceDetails {
                connect: None,
                dns: None,
                ssl: None,
                ..full_details()
            })
        );
    }

    #[test]
    fn should_not_compute_entry_with_negative_durations() {
        let cases: [(&str, fn(&mut TimingRecord)); 6] = [
            ("connectStart > connectEnd", |r| {
                r.connect_end = 10.0;
                r.connect_start = 20.0;
            }),
            ("domainLookupStart > domainLookupEnd", |r| {
                r.domain_lookup_end = 10.0;
                r.domain_lookup_start = 20.0;
            }),
            ("responseStart > responseEnd", |r| {
                r.response_end = 10.0;
                r.response_start = 20.0;
            }),
            ("requestStart > responseStart", |r| {
                r.request_start = 20.0;
                r.response_start = 10.0;
            }),
            ("redirectStart > redirectEnd", |r| {
                r.redirect_end = 10.0;
                r.redirect_start = 20.0;
            }),
            ("secureConnectionStart > connectEnd", |r| {
                r.connect_end = 10.0;
                r.secure_connection_start = 20.0;
            }),
        ];

        for (reason, overrides) in cases {
            let entry = generate_resource_with(overrides);
            assert_eq!(
                compute_performance_resource_details(&entry),
                None,
                "should not compute entry when {reason}"
            );
        }
    }

    #[test]
    fn should_allow_really_fast_document_resource() {
        let entry = generate_resource_with(|r| {
            r.connect_end = 10.0;
            r.connect_start = 10.0;
            r.domain_lookup_end = 10.0;
            r.domain_lookup_start = 10.0;
            r.fetch_start = 10.0;
            r.redirect_end = 0.0;
            r.redirect_start = 0.0;
            r.request_start = 10.0;
            r.response_end = 50.0;
            r.response_start = 40.0;
            r.secure_connection_start = 0.0;
        });
        assert_eq!(
            compute_performance_resource_details(&entry),
            Some(ComputedResourceDetails {
                redirect: None,
                dns: None,
                connect: None,
                ssl: None,
                download: phase(30_000_000, 10_000_000),
                first_byte: phase(0, 30_000_000),
            })
        );
    }

    #[test]
    fn should_use_start_time_and_fetch_start_as_fallback_for_redirect() {
        let entry = generate_resource_with(|r| {
            r.redirect_end = 0.0;
            r.redirect_start = 0.0;
        });
        assert_eq!(
            compute_performance_resource_details(&entry),
            Some(ComputedResourceDetails {
                redirect: Some(phase(0, 2_000_000)),
                ..full_details()
            })
        );
    }

    #[test]
    fn redirect_end_missing_ends_at_fetch_start() {
        let entry = generate_resource_with(|r| r.redirect_end = 0.0);
        let details = compute_performance_resource_details(&entry).unwrap();
        assert_eq!(details.redirect, Some(phase(0, 2_000_000)));
    }

    #[test]
    fn redirect_end_without_start_means_no_redirect() {
        let entry = generate_resource_with(|r| r.redirect_start = 0.0);
        let details = compute_performance_resource_details(&entry).unwrap();
        assert_eq!(details.redirect, None);
    }

    #[test]
    fn first_byte_falls_back_to_fetch_start() {
        let entry = generate_resource_with(|r| r.request_start = 0.0);
        let details = compute_performance_resource_details(&entry).unwrap();
        assert_eq!(details.first_byte, phase(2_000_000, 38_000_000));
    }

    #[test]
    fn connect_is_omitted_when_instantaneous() {
        let entry = generate_resource_with(|r| {
            r.connect_start = 15.0;
            r.connect_end = 15.0;
            r.secure_connection_start = 15.0;
        });
        let details = compute_performance_resource_details(&entry).unwrap();
        assert_eq!(details.connect, None);
        assert_eq!(details.ssl, None);
    }

    #[test]
    fn connect_is_omitted_when_it_starts_at_fetch_start() {
        // The connection lasted 2ms, but starting at fetchStart marks it as reused.
        let entry = generate_resource_with(|r| {
            r.fetch_start = 15.0;
            r.connect_start = 15.0;
            r.connect_end = 17.0;
            r.secure_connection_start = 16.0;
        });
        let details = compute_performance_resource_details(&entry).unwrap();
        assert_eq!(details.connect, None);
        assert_eq!(details.ssl, None);
        assert_eq!(details.dns, Some(phase(3_000_000, 1_000_000)));
        assert_eq!(details.first_byte, phase(10_000_000, 30_000_000));
        assert_eq!(details.download, phase(40_000_000, 10_000_000));
    }

    #[test]
    fn valid_entries_never_produce_negative_durations() {
        let mutations: [fn(&mut TimingRecord); 5] = [
            |_| {},
            |r| r.redirect_end = 0.0,
            |r| r.request_start = 0.0,
            |r| {
                r.redirect_start = 0.0;
                r.redirect_end = 0.0;
                r.fetch_start = 30.0;
            },
            |r| {
                r.secure_connection_start = 0.0;
                r.fetch_start = 15.0;
            },
        ];

        for mutate in mutations {
            let entry = generate_resource_with(mutate);
            if let Some(details) = compute_performance_resource_details(&entry) {
                for (phase, metric) in details.phases() {
                    assert!(metric.duration >= 0, "{phase} has negative duration");
                }
            }
        }
    }

    // ========== compute_performance_resource_duration ==========

    #[test]
    fn should_return_the_entry_duration() {
        let entry = generate_resource_with(|_| {});
        assert_eq!(compute_performance_resource_duration(&entry), 50_000_000);
    }

    #[test]
    fn should_use_other_available_timing_if_the_duration_is_0() {
        let entry = generate_resource_with(|r| r.duration = 0.0);
        assert_eq!(compute_performance_resource_duration(&entry), 50_000_000);

        let entry = generate_resource_with(|r| {
            r.duration = 0.0;
            r.start_time = 5.0;
            r.response_end = 60.5;
        });
        assert_eq!(compute_performance_resource_duration(&entry), 55_500_000);
    }

    // ========== should_track_resource ==========

    struct TestSession {
        id: SessionId,
        tracked_with_resource: bool,
    }

    impl SessionState for TestSession {
        fn id(&self) -> &SessionId {
            &self.id
        }

        fn is_tracked(&self) -> bool {
            true
        }

        fn is_tracked_with_resource(&self) -> bool {
            self.tracked_with_resource
        }
    }

    fn create_session(tracked_with_resource: bool) -> TestSession {
        TestSession {
            id: SessionId::new("123").unwrap(),
            tracked_with_resource,
        }
    }

    fn configuration() -> Configuration {
        let user = UserConfiguration {
            client_token: Some("abcde".to_string()),
            application_id: Some("app".to_string()),
            rum_endpoint: Some("https://rum-intake.com/abcde?foo=bar".to_string()),
            logs_endpoint: Some("https://logs-intake.com/abcde?foo=bar".to_string()),
            trace_endpoint: Some("https://trace-intake.com/abcde?foo=bar".to_string()),
            internal_monitoring_endpoint: Some(
                "https://monitoring-intake.com/abcde?foo=bar".to_string(),
            ),
            ..UserConfiguration::default()
        };
        Configuration::build(&user, BuildEnv::E2eTest).unwrap()
    }

    #[test]
    fn should_exclude_requests_on_intakes_endpoints() {
        assert!(!should_track_resource(
            "https://rum-intake.com/abcde?foo=bar",
            &configuration(),
            &create_session(true)
        ));
    }

    #[test]
    fn should_exclude_requests_on_intakes_endpoints_with_different_client_parameters() {
        assert!(!should_track_resource(
            "https://rum-intake.com/wxyz?foo=qux",
            &configuration(),
            &create_session(true)
        ));
        assert!(!should_track_resource(
            "https://monitoring-intake.com/abcde",
            &configuration(),
            &create_session(true)
        ));
    }

    #[test]
    fn should_allow_requests_on_non_intake_domains() {
        assert!(should_track_resource(
            "https://my-domain.com/hello?a=b",
            &configuration(),
            &create_session(true)
        ));
    }

    #[test]
    fn should_exclude_requests_if_session_does_not_track_requests() {
        assert!(!should_track_resource(
            "https://my-domain.com/hello?a=b",
            &configuration(),
            &create_session(false)
        ));
        assert!(!should_track_resource(
            "https://rum-intake.com/abcde?foo=bar",
            &configuration(),
            &create_session(false)
        ));
    }

    // ========== compute_resource_kind ==========

    fn kind_of(initiator: &str, url: &str) -> ResourceKind {
        compute_resource_kind(&generate_resource_with(|r| {
            r.initiator_type = initiator.to_string();
            r.name = url.to_string();
        }))
    }

    #[test]
    fn resource_kind_prefers_initiator() {
        assert_eq!(kind_of("xmlhttprequest", "https://a.com/app.js"), ResourceKind::Xhr);
        assert_eq!(kind_of("fetch", "https://a.com/data"), ResourceKind::Fetch);
        assert_eq!(kind_of("beacon", "https://a.com/b"), ResourceKind::Beacon);
        assert_eq!(kind_of("img", "https://a.com/pixel"), ResourceKind::Image);
        assert_eq!(kind_of("video", "https://a.com/stream"), ResourceKind::Media);
    }

    #[test]
    fn resource_kind_falls_back_to_extension() {
        assert_eq!(kind_of("link", "https://a.com/style.CSS?v=2"), ResourceKind::Css);
        assert_eq!(kind_of("script", "https://a.com/app.js"), ResourceKind::Js);
        assert_eq!(kind_of("css", "https://a.com/logo.png"), ResourceKind::Image);
        assert_eq!(kind_of("css", "https://a.com/f.woff2"), ResourceKind::Font);
        assert_eq!(kind_of("other", "https://a.com/clip.mp4"), ResourceKind::Media);
        assert_eq!(kind_of("other", "https://a.com/page"), ResourceKind::Other);
        assert_eq!(kind_of("other", "not a url"), ResourceKind::Other);
        assert!(ResourceKind::Fetch.is_request());
        assert!(!ResourceKind::Js.is_request());
    }
}
