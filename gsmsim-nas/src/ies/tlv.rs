use super::IeError;

/// Format of an optional information element (TS 04.08 11.2.1.1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IeFormat {
    /// Type 1: IEI in the high nibble, value in the low nibble
    Tv1,
    /// Type 2: IEI only
    T,
    /// Type 3: IEI followed by a fixed length value
    Tv(usize),
    /// Type 4: IEI, length octet, value
    Tlv,
}

/// Values of the optional IEs found in a message, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlvValues {
    entries: Vec<(u8, Vec<u8>)>,
}

impl TlvValues {
    /// Value of the first IE with the given IEI. Type 2 IEs yield an empty
    /// slice, type 1 IEs their low nibble.
    pub fn get(&self, iei: u8) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(i, _)| *i == iei)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, iei: u8) -> bool {
        self.get(iei).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scanner for the optional part of a message.
///
/// IEs not listed in the definitions are skipped: an IEI with bit 8 set is
/// taken as a single octet IE, anything else as TLV.
#[derive(Debug, Clone, Copy)]
pub struct TlvParser<'a> {
    defs: &'a [(u8, IeFormat)],
}

impl<'a> TlvParser<'a> {
    pub const fn new(defs: &'a [(u8, IeFormat)]) -> Self {
        Self { defs }
    }

    fn format_of(&self, iei: u8) -> Option<(u8, IeFormat)> {
        self.defs.iter().copied().find(|&(def, format)| match format {
            IeFormat::Tv1 => def == iei & 0xF0,
            _ => def == iei,
        })
    }

    pub fn parse(&self, data: &[u8]) -> Result<TlvValues, IeError> {
        let mut values = TlvValues::default();
        let mut pos = 0;

        while pos < data.len() {
            let iei = data[pos];
            let def = self.format_of(iei);
            let format = match def {
                Some((_, format)) => format,
                None if iei & 0x80 != 0 => IeFormat::T,
                None => IeFormat::Tlv,
            };

            let (value, consumed) = match format {
                IeFormat::Tv1 => (vec![iei & 0x0F], 1),
                IeFormat::T => (Vec::new(), 1),
                IeFormat::Tv(len) => (take(data, pos + 1, len)?.to_vec(), 1 + len),
                IeFormat::Tlv => {
                    let len = take(data, pos + 1, 1)?[0] as usize;
                    (take(data, pos + 2, len)?.to_vec(), 2 + len)
                }
            };

            if let Some((key, _)) = def {
                values.entries.push((key, value));
            }
            pos += consumed;
        }

        Ok(values)
    }
}

fn take(data: &[u8], start: usize, len: usize) -> Result<&[u8], IeError> {
    let remaining = data.len().saturating_sub(start);
    if len > remaining {
        return Err(IeError::LengthExceedsBuffer {
            length: len,
            remaining,
        });
    }
    Ok(&data[start..start + len])
}
