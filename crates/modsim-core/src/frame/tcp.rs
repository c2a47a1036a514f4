use crate::encoding::{Reader, Writer};
use crate::frame::{check_min_len, FrameCodec};
use crate::pdu::{Request, Response};
use crate::{DecodeError, EncodeError, FrameError, HeaderMismatch};

pub const MBAP_HEADER_LEN: usize = 7;

/// Unit id that addresses every unit.
pub const BROADCAST_UNIT_ID: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    /// Length includes unit-id byte + function code + data.
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    /// MBAP length field for a frame carrying `data_len` bytes after the
    /// function code.
    pub fn length_for(data_len: usize) -> Result<u16, EncodeError> {
        data_len
            .checked_add(2)
            .and_then(|len| u16::try_from(len).ok())
            .ok_or(EncodeError::ValueOutOfRange)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_be_u16(self.transaction_id)?;
        w.write_be_u16(self.protocol_id)?;
        w.write_be_u16(self.length)?;
        w.write_u8(self.unit_id)?;
        Ok(())
    }

    /// Read the seven header bytes as-is. Acceptance is a separate step.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            transaction_id: r.read_be_u16()?,
            protocol_id: r.read_be_u16()?,
            length: r.read_be_u16()?,
            unit_id: r.read_u8()?,
        })
    }
}

/// MBAP framing for plain TCP connections, serving one configured unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapCodec {
    unit_id: u8,
}

impl MbapCodec {
    pub const fn new(unit_id: u8) -> Self {
        Self { unit_id }
    }

    pub const fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub const fn serves_unit(&self, unit_id: u8) -> bool {
        unit_id == BROADCAST_UNIT_ID || unit_id == self.unit_id
    }
}

impl FrameCodec for MbapCodec {
    const MIN_FRAME_LEN: usize = MBAP_HEADER_LEN + 1;

    fn decode<'a>(&self, buf: &'a [u8]) -> Result<Request<'a>, FrameError> {
        check_min_len(buf, Self::MIN_FRAME_LEN)?;
        let incomplete = |_: DecodeError| FrameError::Incomplete {
            len: buf.len(),
            min: Self::MIN_FRAME_LEN,
        };

        let mut r = Reader::new(buf);
        let header = MbapHeader::decode(&mut r).map_err(incomplete)?;
        let function_code = r.read_u8().map_err(incomplete)?;
        Ok(Request {
            header: Some(header),
            function_code,
            payload: r.read_rest(),
        })
    }

    fn accept_header(&self, request: &Request<'_>) -> Result<(), FrameError> {
        let header = request.header.ok_or(HeaderMismatch::Missing)?;
        if header.protocol_id != 0 {
            return Err(HeaderMismatch::ProtocolId(header.protocol_id).into());
        }
        let actual = request.payload.len() + 2;
        if usize::from(header.length) != actual {
            return Err(HeaderMismatch::Length {
                declared: header.length,
                actual,
            }
            .into());
        }
        if !self.serves_unit(header.unit_id) {
            return Err(HeaderMismatch::UnitId(header.unit_id).into());
        }
        Ok(())
    }

    fn encode(&self, response: &Response<'_>, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let header = response.header().ok_or(EncodeError::MissingHeader)?;
        header.encode(w)?;
        w.write_u8(response.function_code())?;
        w.write_all(response.data())?;
        Ok(())
    }
}
