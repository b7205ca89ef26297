use elefant_truncate::Result;
use std::io::{BufRead, Write};

/// Asks the user to confirm, until they answer `Y` or `n`.
///
/// Returns false if the input ends before an answer is given.
pub fn confirm<W: Write, R: BufRead>(out: &mut W, input: &mut R, message: &str) -> Result<bool> {
    write!(out, "{message} [Y/n] ")?;
    out.flush()?;

    let mut answer = String::new();
    loop {
        answer.clear();
        if input.read_line(&mut answer)? == 0 {
            writeln!(out)?;
            return Ok(false);
        }

        match answer.trim() {
            "Y" => return Ok(true),
            "n" => return Ok(false),
            _ => {
                write!(out, "Please answer Y or n: ")?;
                out.flush()?;
            }
        }
    }
}
