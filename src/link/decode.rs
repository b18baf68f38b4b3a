//! Link-state event extraction from received frames.
//!
//! One frame may chain several messages. The decoder walks them in order,
//! keeps the link info updates that actually changed a flag, runs the
//! attribute walker over each retained payload, and yields one event per
//! message that names its interface. Updates with no changed flags and
//! updates without a name attribute are skipped silently.

use thiserror::Error;
use tracing::debug;

use crate::link::{
    attr::find_ifname,
    event::{LinkEvent, LinkState},
    frame::{IfInfo, Messages, NLMSG_DONE, NLMSG_ERROR, RTM_NEWLINK},
};

/// Recoverable decode failures. The current frame is abandoned; the
/// receive loop carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The kernel reported an error condition within the stream.
    #[error("error message in event stream (code {code:?})")]
    ErrorMessage { code: Option<i32> },
}

/// Decode one received frame into link-state change events, lazily.
///
/// Events come out in the order their messages appear in the frame. An
/// in-stream error message is yielded as the final item; a done marker or
/// an inconsistent declared length simply ends the sequence.
pub fn decode(frame: &[u8]) -> LinkEvents<'_> {
    LinkEvents {
        messages: Messages::new(frame),
        finished: false,
    }
}

/// Lazy iterator over the events of one frame.
pub struct LinkEvents<'a> {
    messages: Messages<'a>,
    finished: bool,
}

impl Iterator for LinkEvents<'_> {
    type Item = Result<LinkEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let Some((header, payload)) = self.messages.next() else {
                if self.messages.truncated() {
                    debug!(
                        event.name = "link_monitor.frame_truncated",
                        "frame ended on an inconsistent message length"
                    );
                }
                self.finished = true;
                return None;
            };

            match header.kind {
                NLMSG_DONE => {
                    self.finished = true;
                    return None;
                }
                NLMSG_ERROR => {
                    self.finished = true;
                    return Some(Err(DecodeError::ErrorMessage {
                        code: error_code(payload),
                    }));
                }
                RTM_NEWLINK => {
                    let Some((info, attrs)) = IfInfo::parse(payload) else {
                        continue;
                    };
                    if info.change == 0 {
                        continue;
                    }
                    let Some(name) = find_ifname(attrs) else {
                        continue;
                    };
                    return Some(Ok(LinkEvent {
                        name,
                        index: info.index,
                        state: LinkState::from_flags(info.flags),
                    }));
                }
                _ => continue,
            }
        }
    }
}

/// The error payload leads with the negative errno of the failed request.
fn error_code(payload: &[u8]) -> Option<i32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(i32::from_ne_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{
        attr::IFLA_IFNAME,
        event::IFF_UP,
        frame::MsgHeader,
    };

    const RTM_NEWADDR: u16 = 20;

    fn attr(kind: u16, value: &[u8]) -> Vec<u8> {
        let mut out = ((4 + value.len()) as u16).to_ne_bytes().to_vec();
        out.extend_from_slice(&kind.to_ne_bytes());
        out.extend_from_slice(value);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }

    fn name_attr(name: &str) -> Vec<u8> {
        let mut value = name.as_bytes().to_vec();
        value.push(0);
        attr(IFLA_IFNAME, &value)
    }

    fn message(kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = ((MsgHeader::LEN + payload.len()) as u32)
            .to_ne_bytes()
            .to_vec();
        out.extend_from_slice(&kind.to_ne_bytes());
        out.extend_from_slice(&0u16.to_ne_bytes());
        out.extend_from_slice(&1u32.to_ne_bytes());
        out.extend_from_slice(&0u32.to_ne_bytes());
        out.extend_from_slice(payload);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        out
    }

    fn link_payload(index: i32, flags: u32, change: u32, attrs: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8, 0];
        out.extend_from_slice(&1u16.to_ne_bytes());
        out.extend_from_slice(&(index as u32).to_ne_bytes());
        out.extend_from_slice(&flags.to_ne_bytes());
        out.extend_from_slice(&change.to_ne_bytes());
        out.extend_from_slice(attrs);
        out
    }

    fn link_message(name: &str, flags: u32, change: u32) -> Vec<u8> {
        message(RTM_NEWLINK, &link_payload(2, flags, change, &name_attr(name)))
    }

    fn events(frame: &[u8]) -> Vec<Result<LinkEvent, DecodeError>> {
        decode(frame).collect()
    }

    #[test]
    fn single_update_yields_one_event() {
        let frame = link_message("eth0", IFF_UP, IFF_UP);
        let decoded = events(&frame);
        assert_eq!(decoded.len(), 1);
        let event = decoded[0].as_ref().expect("event");
        assert_eq!(event.name, "eth0");
        assert_eq!(event.index, 2);
        assert_eq!(event.state, LinkState::Up);
        assert_eq!(event.to_string(), "Interface eth0 is now up");
    }

    #[test]
    fn cleared_up_flag_reports_down() {
        let frame = link_message("eth0", 0, IFF_UP);
        let decoded = events(&frame);
        assert_eq!(decoded.len(), 1);
        let event = decoded[0].as_ref().expect("event");
        assert_eq!(event.state, LinkState::Down);
        assert_eq!(event.to_string(), "Interface eth0 is now down");
    }

    #[test]
    fn all_flag_bits_set_reports_up() {
        let frame = link_message("eth0", u32::MAX, IFF_UP);
        let decoded = events(&frame);
        assert_eq!(decoded[0].as_ref().expect("event").state, LinkState::Up);
    }

    #[test]
    fn zero_changed_flags_yields_nothing() {
        let frame = link_message("eth0", IFF_UP, 0);
        assert!(events(&frame).is_empty());
    }

    #[test]
    fn missing_name_attribute_yields_nothing() {
        let frame = message(RTM_NEWLINK, &link_payload(2, IFF_UP, IFF_UP, &attr(1, &[6; 6])));
        assert!(events(&frame).is_empty());
    }

    #[test]
    fn other_message_kinds_are_skipped() {
        let mut frame = message(RTM_NEWADDR, &link_payload(2, IFF_UP, IFF_UP, &name_attr("eth0")));
        frame.extend_from_slice(&link_message("eth1", IFF_UP, IFF_UP));
        let decoded = events(&frame);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().expect("event").name, "eth1");
    }

    #[test]
    fn short_link_payload_is_skipped() {
        let mut frame = message(RTM_NEWLINK, &[0; 8]);
        frame.extend_from_slice(&link_message("eth0", IFF_UP, IFF_UP));
        let decoded = events(&frame);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().expect("event").name, "eth0");
    }

    #[test]
    fn events_preserve_message_order() {
        let mut frame = link_message("eth0", IFF_UP, IFF_UP);
        frame.extend_from_slice(&link_message("eth1", 0, IFF_UP));
        let decoded = events(&frame);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].as_ref().expect("first").name, "eth0");
        assert_eq!(decoded[1].as_ref().expect("second").name, "eth1");
    }

    #[test]
    fn truncated_record_keeps_complete_prefix() {
        let mut frame = link_message("eth0", IFF_UP, IFF_UP);
        // Second message declares 64 bytes but the frame ends after 24
        frame.extend_from_slice(&64u32.to_ne_bytes());
        frame.extend_from_slice(&RTM_NEWLINK.to_ne_bytes());
        frame.extend_from_slice(&[0; 18]);
        let decoded = events(&frame);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().expect("event").name, "eth0");
    }

    #[test]
    fn error_message_halts_the_frame() {
        let mut frame = message(NLMSG_ERROR, &(-19i32).to_ne_bytes());
        frame.extend_from_slice(&link_message("eth0", IFF_UP, IFF_UP));
        let decoded = events(&frame);
        assert_eq!(decoded.len(), 1);
        assert_eq!(
            decoded[0],
            Err(DecodeError::ErrorMessage { code: Some(-19) })
        );
    }

    #[test]
    fn empty_error_payload_has_no_code() {
        let frame = message(NLMSG_ERROR, &[]);
        let decoded = events(&frame);
        assert_eq!(decoded[0], Err(DecodeError::ErrorMessage { code: None }));
    }

    #[test]
    fn done_marker_halts_the_frame() {
        let mut frame = message(NLMSG_DONE, &[]);
        frame.extend_from_slice(&link_message("eth0", IFF_UP, IFF_UP));
        assert!(events(&frame).is_empty());
    }

    #[test]
    fn empty_frame_yields_nothing() {
        assert!(events(&[]).is_empty());
    }
}
