//! Prometheus text exposition of collected observations.

use std::collections::BTreeMap;
use std::io::{self, Write};

use prometheus::proto::{self, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

use crate::emit::{Observation, Value};
use crate::error::ExportError;

/// Content type of [`encode_text`] output.
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

fn metric_type(value: &Value) -> MetricType {
    match value {
        Value::Gauge(_) => MetricType::GAUGE,
        Value::Untyped(_) => MetricType::UNTYPED,
        Value::Histogram(_) => MetricType::HISTOGRAM,
    }
}

fn metric(obs: &Observation<'_>) -> proto::Metric {
    let mut m = proto::Metric::default();
    for (name, value) in obs.desc.variable_labels.iter().zip(&obs.labels) {
        let mut pair = proto::LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        m.mut_label().push(pair);
    }
    match &obs.value {
        Value::Gauge(v) => {
            let mut g = proto::Gauge::default();
            g.set_value(*v);
            m.set_gauge(g);
        }
        Value::Untyped(v) => {
            let mut u = proto::Untyped::default();
            u.set_value(*v);
            m.set_untyped(u);
        }
        Value::Histogram(h) => {
            let mut hist = proto::Histogram::default();
            hist.set_sample_count(h.count);
            hist.set_sample_sum(h.sum);
            for &(upper_bound, cumulative) in &h.buckets {
                let mut b = proto::Bucket::default();
                b.set_upper_bound(upper_bound);
                b.set_cumulative_count(cumulative);
                hist.mut_bucket().push(b);
            }
            m.set_histogram(hist);
        }
    }
    m
}

/// Groups observations into one family per metric name, sorted by name.
/// Samples keep their observation order within a family.
pub fn families(observations: &[Observation<'_>]) -> Vec<MetricFamily> {
    let mut by_name: BTreeMap<&str, MetricFamily> = BTreeMap::new();
    for obs in observations {
        let family = by_name.entry(obs.name()).or_insert_with(|| {
            let mut f = MetricFamily::default();
            f.set_name(obs.desc.fq_name.clone());
            f.set_help(obs.desc.help.clone());
            f.set_field_type(metric_type(&obs.value));
            f
        });
        family.mut_metric().push(metric(obs));
    }
    by_name.into_values().collect()
}

/// Renders families in the Prometheus text format.
///
/// `TextEncoder` has no support for untyped families, so those are written
/// here in the same format.
pub fn encode_text(families: &[MetricFamily]) -> Result<Vec<u8>, ExportError> {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    for family in families {
        if family.get_field_type() == MetricType::UNTYPED {
            write_untyped(family, &mut buf)
                .map_err(|e| ExportError::Encode(prometheus::Error::Io(e)))?;
        } else {
            encoder
                .encode(std::slice::from_ref(family), &mut buf)
                .map_err(ExportError::Encode)?;
        }
    }
    Ok(buf)
}

fn write_untyped(family: &MetricFamily, w: &mut impl Write) -> io::Result<()> {
    let name = family.get_name();
    writeln!(w, "# HELP {} {}", name, escape(family.get_help(), false))?;
    writeln!(w, "# TYPE {name} untyped")?;
    for m in family.get_metric() {
        w.write_all(name.as_bytes())?;
        let mut sep = '{';
        for pair in m.get_label() {
            write!(
                w,
                "{sep}{}=\"{}\"",
                pair.get_name(),
                escape(pair.get_value(), true)
            )?;
            sep = ',';
        }
        if sep == ',' {
            w.write_all(b"}")?;
        }
        writeln!(w, " {}", m.get_untyped().get_value())?;
    }
    Ok(())
}

/// Escapes backslash and newline, plus double quotes in label values.
fn escape(s: &str, quotes: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '"' if quotes => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}
