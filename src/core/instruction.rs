// Packed update-instruction framing: fixed-width owner prefix, selector strides.
use crate::core::addr::{ADDR_LEN, FacetAddr, SELECTOR_LEN, Selector};
use crate::core::error::{Error, ErrorKind};

/// One packed update record: an owner reference followed by the selectors to
/// associate with it. The null owner marks remove-semantics for every
/// selector in the record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    pub owner: FacetAddr,
    pub selectors: Vec<Selector>,
}

impl Instruction {
    pub fn assign(owner: FacetAddr, selectors: Vec<Selector>) -> Self {
        Self { owner, selectors }
    }

    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self {
            owner: FacetAddr::NULL,
            selectors,
        }
    }

    pub fn is_remove(&self) -> bool {
        self.owner.is_null()
    }

    /// Decode one record: `[owner(20)][selector(4)]...[selector(4)]`, n >= 1.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < ADDR_LEN {
            return Err(Error::new(ErrorKind::Malformed)
                .with_message("record shorter than the owner reference"));
        }
        let mut owner_bytes = [0u8; ADDR_LEN];
        owner_bytes.copy_from_slice(&bytes[..ADDR_LEN]);
        let owner = FacetAddr::from_bytes(owner_bytes);

        let rest = &bytes[ADDR_LEN..];
        if rest.is_empty() {
            return Err(Error::new(ErrorKind::Malformed)
                .with_message("record carries no selectors"));
        }
        if rest.len() % SELECTOR_LEN != 0 {
            return Err(Error::new(ErrorKind::Malformed).with_message(format!(
                "selector run of {} bytes is not a multiple of {SELECTOR_LEN}",
                rest.len()
            )));
        }

        let mut selectors = Vec::with_capacity(rest.len() / SELECTOR_LEN);
        for stride in rest.chunks_exact(SELECTOR_LEN) {
            let mut selector = [0u8; SELECTOR_LEN];
            selector.copy_from_slice(stride);
            selectors.push(Selector::from_bytes(selector));
        }

        Ok(Self { owner, selectors })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ADDR_LEN + self.selectors.len() * SELECTOR_LEN);
        out.extend_from_slice(self.owner.as_bytes());
        for selector in &self.selectors {
            out.extend_from_slice(selector.as_bytes());
        }
        out
    }
}

/// Decode a whole batch, tagging framing errors with the failing record index.
pub fn decode_batch(records: &[Vec<u8>]) -> Result<Vec<Instruction>, Error> {
    let mut batch = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let instruction = Instruction::decode(record).map_err(|err| err.with_record(index))?;
        batch.push(instruction);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::{Instruction, decode_batch};
    use crate::core::addr::{FacetAddr, Selector};
    use crate::core::error::ErrorKind;

    fn addr(tag: u8) -> FacetAddr {
        let mut bytes = [0u8; 20];
        bytes[19] = tag;
        FacetAddr::from_bytes(bytes)
    }

    fn sel(tag: u8) -> Selector {
        Selector::from_bytes([tag, tag, tag, tag])
    }

    #[test]
    fn decode_reads_owner_then_selector_strides() {
        let mut record = Vec::new();
        record.extend_from_slice(addr(7).as_bytes());
        record.extend_from_slice(sel(1).as_bytes());
        record.extend_from_slice(sel(2).as_bytes());

        let instruction = Instruction::decode(&record).expect("decode");
        assert_eq!(instruction.owner, addr(7));
        assert_eq!(instruction.selectors, vec![sel(1), sel(2)]);
        assert!(!instruction.is_remove());
    }

    #[test]
    fn null_owner_marks_remove_semantics() {
        let mut record = Vec::new();
        record.extend_from_slice(FacetAddr::NULL.as_bytes());
        record.extend_from_slice(sel(9).as_bytes());

        let instruction = Instruction::decode(&record).expect("decode");
        assert!(instruction.is_remove());
    }

    #[test]
    fn encode_round_trips() {
        let instruction = Instruction::assign(addr(3), vec![sel(1), sel(2), sel(3)]);
        let decoded = Instruction::decode(&instruction.encode()).expect("decode");
        assert_eq!(decoded, instruction);
    }

    #[test]
    fn short_record_is_malformed() {
        let err = Instruction::decode(&[0u8; 10]).expect_err("short record");
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn empty_selector_run_is_malformed() {
        let err = Instruction::decode(addr(1).as_bytes()).expect_err("no selectors");
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn ragged_selector_run_is_malformed() {
        let mut record = Vec::new();
        record.extend_from_slice(addr(1).as_bytes());
        record.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee]);

        let err = Instruction::decode(&record).expect_err("ragged run");
        assert_eq!(err.kind(), ErrorKind::Malformed);
    }

    #[test]
    fn batch_errors_carry_the_record_index() {
        let good = Instruction::assign(addr(1), vec![sel(1)]).encode();
        let bad = addr(2).as_bytes().to_vec();

        let err = decode_batch(&[good, bad]).expect_err("second record bad");
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.record(), Some(1));
    }
}
