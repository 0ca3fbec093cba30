use std::fmt;

/// A finished trace, read back in full.
///
/// Produced once per session and moved into exactly one delivery.
#[derive(PartialEq, Eq)]
pub struct Payload {
	text: String,
}

impl Payload {
	pub fn new(text: impl Into<String>) -> Self {
		Self { text: text.into() }
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}

	pub fn len(&self) -> usize {
		self.text.len()
	}

	pub fn is_empty(&self) -> bool {
		self.text.is_empty()
	}

	pub fn into_string(self) -> String {
		self.text
	}

	/// Splits into consecutive pieces of at most `max_bytes`, never inside a
	/// UTF-8 sequence. An empty payload is one empty piece.
	pub fn pieces(&self, max_bytes: usize) -> Vec<&str> {
		// a piece must fit any single scalar
		let max_bytes = max_bytes.max(4);
		let mut pieces = Vec::with_capacity(self.text.len() / max_bytes + 1);
		let mut rest = self.text.as_str();
		while rest.len() > max_bytes {
			let mut cut = max_bytes;
			while !rest.is_char_boundary(cut) {
				cut -= 1;
			}
			let (head, tail) = rest.split_at(cut);
			pieces.push(head);
			rest = tail;
		}
		pieces.push(rest);
		pieces
	}
}

impl fmt::Debug for Payload {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Payload").field("len", &self.text.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pieces_concatenate_to_payload() {
		let payload = Payload::new("{\"traceEvents\":[1,2,3]}");
		let pieces = payload.pieces(5);
		assert!(pieces.iter().all(|p| p.len() <= 5));
		assert_eq!(pieces.concat(), payload.as_str());
	}

	#[test]
	fn split_respects_char_boundaries() {
		let payload = Payload::new("ab\u{1F600}cd\u{e9}");
		let pieces = payload.pieces(4);
		assert_eq!(pieces, vec!["ab", "\u{1F600}", "cd\u{e9}"]);
	}

	#[test]
	fn small_payload_is_one_piece() {
		assert_eq!(Payload::new("abc").pieces(1024), vec!["abc"]);
	}

	#[test]
	fn empty_payload_is_one_empty_piece() {
		assert_eq!(Payload::new("").pieces(16), vec![""]);
	}
}
