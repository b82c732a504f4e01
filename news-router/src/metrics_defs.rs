use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with route, status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const UPSTREAM_REQUESTS: MetricDef = MetricDef {
    name: "upstream.requests",
    metric_type: MetricType::Counter,
    description: "Calls made to the news API. Tagged with route, outcome.",
};

pub const FALLBACKS: MetricDef = MetricDef {
    name: "fallback.triggered",
    metric_type: MetricType::Counter,
    description: "Fallback queries issued. Tagged with route, cause.",
};

pub const ARTICLES_DROPPED: MetricDef = MetricDef {
    name: "articles.dropped",
    metric_type: MetricType::Counter,
    description: "Articles removed by the response filter. Tagged with reason.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    UPSTREAM_REQUESTS,
    FALLBACKS,
    ARTICLES_DROPPED,
];
