//! Streaming aggregator: the sole consumer of a completion's fragment
//! sequence.

use std::io::Write;

use crate::Result;
use crate::openai::ApiError;

/// Forwards each fragment to `out` as it arrives and returns the
/// concatenation of everything received.
///
/// On a mid-stream failure the diagnostic is written to `out` and whatever
/// was accumulated so far is returned; partial answers are acceptable here
/// and nowhere else. IO failures on `out` itself do propagate.
#[inline]
pub fn drain_stream<I>(fragments: I, out: &mut impl Write) -> Result<String>
where
    I: IntoIterator<Item = std::result::Result<String, ApiError>>,
{
    let mut answer = String::new();
    for fragment in fragments {
        match fragment {
            Ok(content) => {
                write!(out, "{content}")?;
                out.flush()?;
                answer.push_str(&content);
            }
            Err(e) => {
                writeln!(out, "\nError during streaming response: {e}")?;
                return Ok(answer);
            }
        }
    }
    writeln!(out)?;
    Ok(answer)
}
