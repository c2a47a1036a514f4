use modsim_core::encoding::Writer;
use modsim_core::frame::{FrameCodec, HeaderlessCodec, MbapCodec, MAX_FRAME_LEN};
use modsim_core::pdu::{validate_pdu, ExceptionCode, Response};
use proptest::prelude::*;

proptest! {
    #[test]
    fn decode_does_not_panic(data in proptest::collection::vec(any::<u8>(), 0..MAX_FRAME_LEN)) {
        let codec = MbapCodec::new(1);
        if let Ok(request) = codec.decode(&data) {
            let _ = codec.accept_header(&request);
            let _ = validate_pdu(request.function_code, request.payload);
        }
        let _ = HeaderlessCodec.decode(&data);
    }

    #[test]
    fn mbap_reencode_keeps_header_and_updates_length(
        transaction_id in any::<u16>(),
        unit_id in any::<u8>(),
        function_code in any::<u8>(),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
        data in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut frame = Vec::with_capacity(8 + payload.len());
        frame.extend_from_slice(&transaction_id.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        frame.push(unit_id);
        frame.push(function_code);
        frame.extend_from_slice(&payload);

        let codec = MbapCodec::new(unit_id);
        let request = codec.decode(&frame).unwrap();
        prop_assert!(codec.accept_header(&request).is_ok());

        let response = Response::new(&request, function_code, &data).unwrap();
        let mut out = [0u8; MAX_FRAME_LEN];
        let mut w = Writer::new(&mut out);
        codec.encode(&response, &mut w).unwrap();
        let written = w.as_written();

        prop_assert_eq!(&written[0..4], &frame[0..4]);
        prop_assert_eq!(&written[4..6], &((data.len() + 2) as u16).to_be_bytes());
        prop_assert_eq!(&written[6..8], &frame[6..8]);
        prop_assert_eq!(&written[8..], data.as_slice());
    }

    #[test]
    fn unsupported_codes_are_always_illegal_function(
        code in any::<u8>().prop_filter("supported", |c| !matches!(c, 0x01..=0x06 | 0x0F | 0x10)),
        payload in proptest::collection::vec(any::<u8>(), 0..16),
    ) {
        prop_assert_eq!(validate_pdu(code, &payload), Err(ExceptionCode::IllegalFunction));
    }
}
