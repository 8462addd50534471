//! Property-based tests for routing-key extraction

#[cfg(test)]
mod tests {
    use crate::builder;
    use crate::routing::extract_routing_key;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_extract_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = extract_routing_key(&data);
        }

        #[test]
        fn prop_uplink_key_is_amf_id(
            amf in 0u64..=1_099_511_627_775,
            ran in any::<u32>(),
            nas in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let bytes = builder::build_uplink_nas_transport(amf, ran, &nas).unwrap();
            prop_assert_eq!(extract_routing_key(&bytes), Some(amf));
        }

        #[test]
        fn prop_initial_ue_key_is_ran_id(
            ran in any::<u32>(),
            nas in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let bytes = builder::build_initial_ue_message(ran, &nas).unwrap();
            prop_assert_eq!(extract_routing_key(&bytes), Some(ran as u64));
        }

        #[test]
        fn prop_corrupted_message_never_panics(
            amf in any::<u32>(),
            flip in any::<usize>(),
            mask in 1u8..=255,
        ) {
            let mut bytes = builder::build_uplink_nas_transport(amf as u64, 1, &[0x7e, 0, 0x41]).unwrap();
            let idx = flip % bytes.len();
            bytes[idx] ^= mask;
            let _ = extract_routing_key(&bytes);
        }
    }
}
