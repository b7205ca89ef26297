use elefant_truncate::{Result, TableSnapshot, TableStatus};
use std::io::Write;
use std::time::Duration;
use tokio::sync::watch;

/// Prints the progress of every table.
///
/// On a terminal the lines are redrawn in place. Otherwise only lines that changed since the
/// last render are printed, so logs don't fill up with repeated lines.
pub struct ProgressPrinter {
    receivers: Vec<watch::Receiver<TableSnapshot>>,
    name_width: usize,
    redraw: bool,
    printed_lines: usize,
    last_lines: Vec<Option<String>>,
}

impl ProgressPrinter {
    pub fn new(receivers: Vec<watch::Receiver<TableSnapshot>>, redraw: bool) -> Self {
        let name_width = receivers
            .iter()
            .map(|r| r.borrow().table_name.to_string().len())
            .max()
            .unwrap_or(0);
        let last_lines = vec![None; receivers.len()];

        Self {
            receivers,
            name_width,
            redraw,
            printed_lines: 0,
            last_lines,
        }
    }

    pub fn render<W: Write>(&mut self, out: &mut W, elapsed: Duration) -> Result {
        let lines = self
            .receivers
            .iter()
            .map(|r| format_line(&r.borrow(), self.name_width))
            .collect::<Vec<_>>();

        if self.redraw {
            if self.printed_lines > 0 {
                write!(out, "\x1b[{}A", self.printed_lines)?;
            }
            writeln!(out, "\x1b[2KElapsed: {}s", elapsed.as_secs())?;
            for line in &lines {
                writeln!(out, "\x1b[2K{line}")?;
            }
            self.printed_lines = lines.len() + 1;
        } else {
            for (last, line) in self.last_lines.iter_mut().zip(lines) {
                if last.as_ref() != Some(&line) {
                    writeln!(out, "[{}s] {line}", elapsed.as_secs())?;
                    *last = Some(line);
                }
            }
        }

        out.flush()?;
        Ok(())
    }
}

pub fn format_line(snapshot: &TableSnapshot, name_width: usize) -> String {
    let name = snapshot.table_name.to_string();
    let status = snapshot.status.label();

    match snapshot.total_rows {
        None => format!("{name:<name_width$}: {status}"),
        Some(total) => {
            let deleted = snapshot.deleted_rows();
            let percent = if total == 0 || snapshot.status == TableStatus::Completed {
                100
            } else {
                deleted * 100 / total
            };

            format!(
                "{name:<name_width$}: {status} ({} / {}) {percent}%",
                format_number(deleted),
                format_number(total)
            )
        }
    }
}

/// Formats a number with thousands separators.
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(c);
    }

    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use elefant_truncate::TableName;

    fn snapshot(name: &str, status: TableStatus, total: Option<u64>, remained: Option<u64>) -> TableSnapshot {
        TableSnapshot {
            table_name: TableName::parse(name),
            status,
            total_rows: total,
            remained_rows: remained,
        }
    }

    #[test]
    fn formats_numbers() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn formats_progress_lines() {
        assert_eq!(
            format_line(&snapshot("orders", TableStatus::Analyzing, None, None), 16),
            "public.orders   : analyzing"
        );
        assert_eq!(
            format_line(
                &snapshot("orders", TableStatus::Deleting, Some(12000), Some(9000)),
                0
            ),
            "public.orders: deleting (3,000 / 12,000) 25%"
        );
        assert_eq!(
            format_line(
                &snapshot("orders", TableStatus::CascadeDeleting, Some(10), Some(10)),
                0
            ),
            "public.orders: deleting (0 / 10) 0%"
        );
        assert_eq!(
            format_line(&snapshot("empty", TableStatus::Completed, Some(0), Some(0)), 0),
            "public.empty: completed (0 / 0) 100%"
        );
    }

    #[test]
    fn prints_only_changed_lines_without_a_terminal() {
        let (orders, orders_receiver) =
            watch::channel(snapshot("orders", TableStatus::Analyzing, None, None));
        let (_customers, customers_receiver) =
            watch::channel(snapshot("customers", TableStatus::Analyzing, None, None));
        let mut printer = ProgressPrinter::new(vec![orders_receiver, customers_receiver], false);

        let mut out = Vec::new();
        printer.render(&mut out, Duration::from_secs(0)).unwrap();
        orders.send_replace(snapshot("orders", TableStatus::Deleting, Some(4), Some(2)));
        printer.render(&mut out, Duration::from_secs(3)).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[0s] public.orders   : analyzing\n\
             [0s] public.customers: analyzing\n\
             [3s] public.orders   : deleting (2 / 4) 50%\n"
        );
    }

    #[test]
    fn redraws_in_place_on_a_terminal() {
        let (_orders, receiver) =
            watch::channel(snapshot("orders", TableStatus::Waiting, Some(5), Some(5)));
        let mut printer = ProgressPrinter::new(vec![receiver], true);

        let mut out = Vec::new();
        printer.render(&mut out, Duration::from_secs(1)).unwrap();
        printer.render(&mut out, Duration::from_secs(2)).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\x1b[2KElapsed: 1s\n\
             \x1b[2Kpublic.orders: waiting (0 / 5) 0%\n\
             \x1b[2A\x1b[2KElapsed: 2s\n\
             \x1b[2Kpublic.orders: waiting (0 / 5) 0%\n"
        );
    }
}
