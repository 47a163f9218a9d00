use std::net::SocketAddr;

use strom_client::SeriesRow;
use tokio::{io::AsyncWriteExt, net::TcpStream};

use super::{SeriesError, SeriesStore};

/// Escape measurement names and field keys for ILP.
///
/// ILP requires escaping commas, spaces and equals with a backslash.
fn ilp_escape_ident(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            ',' | ' ' | '=' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

fn push_field_f64(out: &mut String, first: &mut bool, key: &str, value: f64) {
    if *first {
        *first = false;
    } else {
        out.push(',');
    }

    ilp_escape_ident(key, out);
    out.push('=');
    out.push_str(&value.to_string());
}

fn secs_to_unix_nanos(secs: i64) -> i128 {
    i128::from(secs) * 1_000_000_000
}

/// Renders `row` as one ILP line, without the trailing newline.
///
/// Non-finite values have no ILP representation and are left out; a row that
/// ends up with no fields cannot be written at all.
fn encode_row(measurement: &str, row: &SeriesRow) -> Result<String, SeriesError> {
    let mut out = String::with_capacity(32 + row.columns().len() * 24);
    ilp_escape_ident(measurement, &mut out);

    out.push(' ');
    let mut first = true;
    for (name, value) in row.columns().iter().zip(row.values()) {
        if value.is_finite() {
            push_field_f64(&mut out, &mut first, name, *value);
        }
    }
    if first {
        return Err(SeriesError::EmptyRow);
    }

    out.push(' ');
    out.push_str(&secs_to_unix_nanos(row.timestamp()).to_string());
    Ok(out)
}

/// Appends rows to a QuestDB table over the ILP TCP endpoint.
///
/// Each append opens its own connection; readings arrive seconds apart.
pub struct QuestDbIlpStore {
    addr: SocketAddr,
    measurement: String,
}

impl QuestDbIlpStore {
    pub fn new(addr: SocketAddr, measurement: &str) -> Self {
        Self {
            addr,
            measurement: measurement.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl SeriesStore for QuestDbIlpStore {
    async fn append(&self, row: &SeriesRow) -> Result<(), SeriesError> {
        let mut line = encode_row(&self.measurement, row)?;
        line.push('\n');

        let mut stream = TcpStream::connect(self.addr).await?;
        let _ = stream.set_nodelay(true);
        stream.write_all(line.as_bytes()).await?;
        stream.shutdown().await?;

        metrics::counter!("strom_series_rows_appended_total").increment(1);
        metrics::counter!("questdb_ilp_bytes_total").increment(line.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strom_client::MetricSet;
    use time::macros::datetime;
    use tokio::io::AsyncReadExt;

    fn row(metrics: &[(&str, f64)]) -> SeriesRow {
        let set: MetricSet = metrics.iter().copied().collect();
        SeriesRow::new(datetime!(2024-01-01 00:00:00 UTC), &set)
    }

    #[test]
    fn ilp_escape_ident_escapes_commas_spaces_and_equals() {
        let mut out = String::new();
        ilp_escape_ident("a b,c=d", &mut out);
        assert_eq!(out, "a\\ b\\,c\\=d");
    }

    #[test]
    fn encodes_fields_in_column_order_with_nanosecond_timestamp() {
        let line = encode_row("strom", &row(&[("gesamtLeistung", 1234.5), ("momentanLeistung", 500.0)])).unwrap();
        assert_eq!(line, "strom gesamtLeistung=1234.5,momentanLeistung=500 1704067200000000000");
    }

    #[test]
    fn skips_non_finite_values() {
        let line = encode_row("my meter", &row(&[("a", f64::NAN), ("b", 2.0)])).unwrap();
        assert_eq!(line, "my\\ meter b=2 1704067200000000000");
    }

    #[test]
    fn row_without_fields_is_rejected() {
        assert!(matches!(encode_row("strom", &row(&[])), Err(SeriesError::EmptyRow)));
        assert!(matches!(
            encode_row("strom", &row(&[("a", f64::NAN)])),
            Err(SeriesError::EmptyRow)
        ));
    }

    #[tokio::test]
    async fn append_writes_one_line_to_the_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = String::new();
            socket.read_to_string(&mut buf).await.unwrap();
            buf
        });

        let store = QuestDbIlpStore::new(addr, "strom");
        store.append(&row(&[("gesamtLeistung", 1.5)])).await.unwrap();

        assert_eq!(server.await.unwrap(), "strom gesamtLeistung=1.5 1704067200000000000\n");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_io_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = QuestDbIlpStore::new(addr, "strom");
        let res = store.append(&row(&[("a", 1.0)])).await;
        assert!(matches!(res, Err(SeriesError::Io(_))));
    }
}
