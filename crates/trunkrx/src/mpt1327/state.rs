//! MPT-1327 trunking decoder state
//!
//! Consumes decoded control-channel messages, maintains per-channel
//! trunking state (site, idents, group membership, talkgroups,
//! channel number), and translates activity into call events,
//! traffic-channel allocations, and decoder state events on the
//! channel bus.
//!
//! A control channel instance also listens to the bus for events
//! from its peers: the tuned frequency, reset requests, and traffic
//! channel allocations made by another decoder.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

#[cfg(not(test))]
use log::debug;

#[cfg(test)]
use std::println as debug;

use crate::bus::DecoderStateBus;
use crate::channel::{ChannelMap, ChannelType};
use crate::event::{
    CallEvent, CallEventKind, ChangeChannelTimeoutEvent, ChangedAttribute, ChannelState,
    DecoderEvent, DecoderStateEvent, Metadata, MetadataType, SourceId, StateEventKind,
};
use crate::mpt1327::message::{IdentType, MessageType, Mpt1327Message};

/// Call timeout applied when a STANDARD channel resets, in ms
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 45_000;

/// Per-channel MPT-1327 protocol state machine
pub struct Mpt1327DecoderState {
    bus: DecoderStateBus,
    source: SourceId,
    idents: BTreeSet<String>,
    groups: BTreeMap<String, Vec<String>>,
    site: Option<String>,
    from_talkgroup: Option<String>,
    to_talkgroup: Option<String>,
    channel_number: u16,
    channel_type: ChannelType,
    channel_map: Option<ChannelMap>,
    frequency: u64,
    call_timeout_ms: u64,
    current_call: Option<CallEvent>,
}

impl Mpt1327DecoderState {
    /// Constructs an instance bound to a channel bus
    ///
    /// `channel_map` resolves traffic channel numbers to
    /// frequencies; without one, allocations carry frequency 0.
    /// `call_timeout_ms` is the fade timeout issued when a MAINT
    /// message arrives on a `Standard` channel.
    pub fn new(
        bus: &DecoderStateBus,
        channel_map: Option<ChannelMap>,
        channel_type: ChannelType,
        call_timeout_ms: u64,
    ) -> Self {
        Self {
            bus: bus.clone(),
            source: bus.register_source(),
            idents: BTreeSet::new(),
            groups: BTreeMap::new(),
            site: None,
            from_talkgroup: None,
            to_talkgroup: None,
            channel_number: 0,
            channel_type,
            channel_map,
            frequency: 0,
            call_timeout_ms,
            current_call: None,
        }
    }

    /// Subscribe a shared decoder state to its bus
    ///
    /// The subscription forwards peer state events into
    /// [`receive_decoder_state_event()`][Self::receive_decoder_state_event];
    /// the state's own broadcasts are skipped by source identity.
    pub fn attach(state: Rc<RefCell<Self>>) {
        let bus = state.borrow().bus.clone();
        let own_source = state.borrow().source;
        bus.subscribe(move |event| {
            if let DecoderEvent::State(state_event) = event {
                if state_event.source != own_source {
                    state.borrow_mut().receive_decoder_state_event(state_event);
                }
            }
        });
    }

    /// Identity this state broadcasts under
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Channel role
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Site identifier, once observed from an aloha message
    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    /// Idents observed on this channel, sorted
    pub fn idents(&self) -> &BTreeSet<String> {
        &self.idents
    }

    /// Group membership: destination ident → callers, first heard
    /// first
    pub fn groups(&self) -> &BTreeMap<String, Vec<String>> {
        &self.groups
    }

    /// Current channel number
    pub fn channel_number(&self) -> u16 {
        self.channel_number
    }

    /// Current channel frequency, in Hz
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Originating talkgroup of the current call
    pub fn from_talkgroup(&self) -> Option<&str> {
        self.from_talkgroup.as_deref()
    }

    /// Destination talkgroup of the current call
    pub fn to_talkgroup(&self) -> Option<&str> {
        self.to_talkgroup.as_deref()
    }

    /// Process one decoded control-channel message
    ///
    /// Invalid messages are dropped silently.
    pub fn receive(&mut self, message: &Mpt1327Message) {
        if !message.is_valid() {
            debug!("mpt1327: dropping invalid message: {}", message);
            return;
        }

        match message.message_type() {
            MessageType::Ack => {
                self.add_ident(message.from_id());

                let ident_type = message.ident1_type().unwrap_or(IdentType::Unknown);
                if ident_type == IdentType::Regi {
                    // the acknowledgement travels system → unit, so
                    // the roles are swapped for the register record
                    let mut builder = CallEvent::builder(CallEventKind::Register)
                        .channel(self.channel_number.to_string())
                        .details("REGISTERED ON NETWORK")
                        .frequency(self.frequency);
                    if let Some(to) = message.to_id() {
                        builder = builder.from(to);
                    }
                    if let Some(from) = message.from_id() {
                        builder = builder.to(from);
                    }
                    self.bus.broadcast(DecoderEvent::Call(builder.build()));
                } else {
                    let mut builder = CallEvent::builder(CallEventKind::Response)
                        .channel(self.channel_number.to_string())
                        .details(format!("ACK {}", ident_type.label()))
                        .frequency(self.frequency);
                    if let Some(from) = message.from_id() {
                        builder = builder.from(from);
                    }
                    if let Some(to) = message.to_id() {
                        builder = builder.to(to);
                    }
                    self.bus.broadcast(DecoderEvent::Call(builder.build()));
                }

                self.broadcast_state(StateEventKind::Continuation, ChannelState::Control);
            }
            MessageType::Acki => {
                self.add_ident(message.from_id());
                self.add_ident(message.to_id());

                self.broadcast_state(StateEventKind::Continuation, ChannelState::Control);
            }
            MessageType::Ahyc => {
                self.add_ident(message.to_id());

                let mut builder = CallEvent::builder(CallEventKind::Command)
                    .channel(self.channel_number.to_string())
                    .frequency(self.frequency);
                if let Some(request) = message.request_string() {
                    builder = builder.details(request);
                }
                if let Some(from) = message.from_id() {
                    builder = builder.from(from);
                }
                if let Some(to) = message.to_id() {
                    builder = builder.to(to);
                }
                self.bus.broadcast(DecoderEvent::Call(builder.build()));

                self.broadcast_state(StateEventKind::Continuation, ChannelState::Control);
            }
            MessageType::Ahyq => {
                let mut builder = CallEvent::builder(CallEventKind::Status)
                    .channel(self.channel_number.to_string())
                    .frequency(self.frequency);
                if let Some(status) = message.status_message() {
                    builder = builder.details(status);
                }
                if let Some(from) = message.from_id() {
                    builder = builder.from(from);
                }
                if let Some(to) = message.to_id() {
                    builder = builder.to(to);
                }
                self.bus.broadcast(DecoderEvent::Call(builder.build()));

                self.broadcast_state(StateEventKind::Continuation, ChannelState::Control);
            }
            MessageType::Alh => {
                if let Some(site) = message.site_id() {
                    if self.site.as_deref() != Some(site) {
                        self.site = Some(site.to_string());
                        self.broadcast_attribute(ChangedAttribute::ChannelSiteNumber);
                    }
                }

                self.broadcast_state(StateEventKind::Start, ChannelState::Control);
            }
            MessageType::Gtc => {
                self.add_ident(message.from_id());
                self.add_ident(message.to_id());

                // capture the idents that talk to each group
                if let (Some(from), Some(to)) = (message.from_id(), message.to_id()) {
                    let members = self.groups.entry(to.to_string()).or_default();
                    if !members.iter().any(|member| member == from) {
                        members.push(from.to_string());
                    }
                }

                let channel = message.channel();
                let frequency = self
                    .channel_map
                    .as_ref()
                    .map(|map| map.frequency(channel))
                    .unwrap_or(0);

                let mut builder = CallEvent::builder(CallEventKind::Call)
                    .channel(channel.to_string())
                    .details("GTC")
                    .frequency(frequency);
                if let Some(from) = message.from_id() {
                    builder = builder.from(from);
                }
                if let Some(to) = message.to_id() {
                    builder = builder.to(to);
                }

                self.broadcast_state(
                    StateEventKind::TrafficChannelAllocation(builder.build()),
                    ChannelState::Control,
                );
            }
            MessageType::HeadPlus1
            | MessageType::HeadPlus2
            | MessageType::HeadPlus3
            | MessageType::HeadPlus4 => {
                // short data messages carry no channel or frequency
                let mut builder = CallEvent::builder(CallEventKind::Sdm);
                if let Some(text) = message.free_text() {
                    builder = builder.details(text);
                }
                if let Some(from) = message.from_id() {
                    builder = builder.from(from);
                }
                if let Some(to) = message.to_id() {
                    builder = builder.to(to);
                }
                self.bus.broadcast(DecoderEvent::Call(builder.build()));

                self.broadcast_state(StateEventKind::Continuation, ChannelState::Control);
            }
            MessageType::Clear => {
                self.channel_number = message.channel();

                self.broadcast_state(StateEventKind::End, ChannelState::Fade);
            }
            MessageType::Maint => {
                if self.channel_type == ChannelType::Standard {
                    // a MAINT message on a standard channel means we
                    // are monitoring a traffic channel directly, so
                    // the user's call timeout replaces the default
                    self.bus
                        .broadcast(DecoderEvent::ChannelTimeout(ChangeChannelTimeoutEvent {
                            source: self.source,
                            channel_type: self.channel_type,
                            timeout_ms: self.call_timeout_ms,
                        }));

                    if self.current_call.is_none() {
                        let mut builder = CallEvent::builder(CallEventKind::Call)
                            .channel(self.channel_number.to_string())
                            .details("MONITORED TRAFFIC CHANNEL")
                            .frequency(self.frequency);
                        if let Some(to) = message.to_id() {
                            builder = builder.to(to);
                        }
                        let call = builder.build();
                        self.current_call = Some(call.clone());
                        self.bus.broadcast(DecoderEvent::Call(call));
                    }

                    if let Some(to) = message.to_id() {
                        self.bus.broadcast(DecoderEvent::Metadata(Metadata {
                            metadata_type: MetadataType::To,
                            value: to.to_string(),
                            live: true,
                        }));
                    }

                    self.broadcast_state(StateEventKind::Start, ChannelState::Call);

                    self.set_to_talkgroup(message.to_id().map(str::to_string));
                }
            }
            _ => {}
        }
    }

    /// Process a state event from a peer on the channel bus
    pub fn receive_decoder_state_event(&mut self, event: &DecoderStateEvent) {
        match &event.kind {
            StateEventKind::Reset => {
                self.reset_state();
            }
            StateEventKind::SourceFrequency(frequency) => {
                self.frequency = *frequency;
            }
            StateEventKind::TrafficChannelAllocation(call) => {
                if event.source != self.source {
                    self.adopt_allocation(call);
                }
            }
            _ => {}
        }
    }

    /// Clear all accumulated state
    ///
    /// Clears the ident and group registries and runs the same soft
    /// reset a bus `Reset` event performs.
    pub fn reset(&mut self) {
        self.idents.clear();
        self.groups.clear();
        self.reset_state();
    }

    /// Set the current channel number, announcing the change
    ///
    /// Used primarily for traffic channels, where the channel is
    /// identified before the decoder is created.
    pub fn set_channel_number(&mut self, channel: u16) {
        self.channel_number = channel;
        self.broadcast_attribute(ChangedAttribute::ChannelNumber);
    }

    /// Set the originating talkgroup, announcing the change
    pub fn set_from_talkgroup(&mut self, talkgroup: Option<String>) {
        self.from_talkgroup = talkgroup;
        self.broadcast_attribute(ChangedAttribute::FromTalkgroup);
    }

    /// Set the destination talkgroup, announcing the change
    pub fn set_to_talkgroup(&mut self, talkgroup: Option<String>) {
        self.to_talkgroup = talkgroup;
        self.broadcast_attribute(ChangedAttribute::ToTalkgroup);
    }

    // Soft reset: talkgroups, fade timeout, and the current call.
    // The ident and group registries survive; only the hard reset
    // entry point clears them.
    fn reset_state(&mut self) {
        self.set_from_talkgroup(None);
        self.set_to_talkgroup(None);

        if self.channel_type == ChannelType::Standard {
            self.bus
                .broadcast(DecoderEvent::ChannelTimeout(ChangeChannelTimeoutEvent {
                    source: self.source,
                    channel_type: self.channel_type,
                    timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
                }));

            if let Some(mut call) = self.current_call.take() {
                call.end();
                self.bus.broadcast(DecoderEvent::Call(call));
            }
        }
    }

    // Adopt channel, frequency, and talkgroups from a peer's traffic
    // channel allocation
    fn adopt_allocation(&mut self, call: &CallEvent) {
        if let Some(channel) = call.channel() {
            // an unparseable channel label is ignored
            if let Ok(number) = channel.parse::<u16>() {
                self.channel_number = number;
                self.broadcast_attribute(ChangedAttribute::ChannelNumber);
            }
        }

        self.frequency = call.frequency();
        self.broadcast_attribute(ChangedAttribute::Source);

        self.from_talkgroup = call.from().map(str::to_string);
        self.broadcast_attribute(ChangedAttribute::FromTalkgroup);

        self.to_talkgroup = call.to().map(str::to_string);
        self.broadcast_attribute(ChangedAttribute::ToTalkgroup);
    }

    fn add_ident(&mut self, ident: Option<&str>) {
        if let Some(ident) = ident {
            self.idents.insert(ident.to_string());
        }
    }

    fn broadcast_state(&self, kind: StateEventKind, state: ChannelState) {
        self.bus
            .broadcast(DecoderEvent::State(DecoderStateEvent::new(
                self.source,
                kind,
                state,
            )));
    }

    fn broadcast_attribute(&self, attribute: ChangedAttribute) {
        self.bus.broadcast(DecoderEvent::Attribute {
            source: self.source,
            attribute,
        });
    }
}

impl std::fmt::Debug for Mpt1327DecoderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mpt1327DecoderState")
            .field("source", &self.source)
            .field("channel_type", &self.channel_type)
            .field("site", &self.site)
            .field("channel_number", &self.channel_number)
            .field("frequency", &self.frequency)
            .field("idents", &self.idents.len())
            .field("groups", &self.groups.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::channel::ChannelRange;

    // Subscribe a collector which records every bus event
    fn collect(bus: &DecoderStateBus) -> Rc<RefCell<Vec<DecoderEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    fn standard_state(bus: &DecoderStateBus) -> Mpt1327DecoderState {
        let map = ChannelMap::new("test").with_range(ChannelRange::new(1, 100, 154_800_000, 12_500));
        Mpt1327DecoderState::new(bus, Some(map), ChannelType::Standard, 30_000)
    }

    fn state_kinds(events: &[DecoderEvent]) -> Vec<(String, ChannelState)> {
        events
            .iter()
            .filter_map(|event| match event {
                DecoderEvent::State(state) => {
                    Some((state.kind.as_ref().to_string(), state.state))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_invalid_message_is_dropped() {
        let bus = DecoderStateBus::new();
        let events = collect(&bus);
        let mut state = standard_state(&bus);

        let message = Mpt1327Message::builder(MessageType::Gtc)
            .from("100")
            .to("200")
            .channel(7)
            .invalid()
            .build();
        state.receive(&message);

        assert!(events.borrow().is_empty());
        assert!(state.idents().is_empty());
    }

    #[test]
    fn test_ack_registration_swaps_roles() {
        let bus = DecoderStateBus::new();
        let events = collect(&bus);
        let mut state = standard_state(&bus);

        let message = Mpt1327Message::builder(MessageType::Ack)
            .from("7001")
            .to("300")
            .ident1_type(IdentType::Regi)
            .build();
        state.receive(&message);

        assert!(state.idents().contains("7001"));

        let events = events.borrow();
        let call = events
            .iter()
            .find_map(|event| match event {
                DecoderEvent::Call(call) => Some(call.clone()),
                _ => None,
            })
            .expect("expected register call event");
        assert_eq!(CallEventKind::Register, call.kind());
        assert_eq!(Some("REGISTERED ON NETWORK"), call.details());
        // roles swap so the registering unit is the destination
        assert_eq!(Some("300"), call.from());
        assert_eq!(Some("7001"), call.to());

        assert_eq!(
            vec![("CONTINUATION".to_string(), ChannelState::Control)],
            state_kinds(&events)
        );
    }

    #[test]
    fn test_ack_response_details() {
        let bus = DecoderStateBus::new();
        let events = collect(&bus);
        let mut state = standard_state(&bus);

        let message = Mpt1327Message::builder(MessageType::Ack)
            .from("100")
            .to("200")
            .ident1_type(IdentType::Tsci)
            .build();
        state.receive(&message);

        let events = events.borrow();
        let call = events
            .iter()
            .find_map(|event| match event {
                DecoderEvent::Call(call) => Some(call.clone()),
                _ => None,
            })
            .expect("expected response call event");
        assert_eq!(CallEventKind::Response, call.kind());
        assert_eq!(Some("ACK System Controller"), call.details());
        assert_eq!(Some("100"), call.from());
        assert_eq!(Some("200"), call.to());
    }

    #[test]
    fn test_acki_and_ahyc_record_idents() {
        let bus = DecoderStateBus::new();
        let mut state = standard_state(&bus);

        state.receive(
            &Mpt1327Message::builder(MessageType::Acki)
                .from("101")
                .to("201")
                .build(),
        );
        state.receive(
            &Mpt1327Message::builder(MessageType::Ahyc)
                .from("102")
                .to("202")
                .request("SEND SDM")
                .build(),
        );

        assert!(state.idents().contains("101"));
        assert!(state.idents().contains("201"));
        // AHYC records only the commanded unit
        assert!(!state.idents().contains("102"));
        assert!(state.idents().contains("202"));
    }

    // spec scenario: control channel aloha followed by a traffic
    // channel grant
    #[test]
    fn test_alh_then_gtc_allocation() {
        let bus = DecoderStateBus::new();
        let events = collect(&bus);
        let mut state = standard_state(&bus);

        state.receive(&Mpt1327Message::builder(MessageType::Alh).site("A1").build());
        assert_eq!(Some("A1"), state.site());

        {
            let events = events.borrow();
            assert!(events.iter().any(|event| matches!(
                event,
                DecoderEvent::Attribute {
                    attribute: ChangedAttribute::ChannelSiteNumber,
                    ..
                }
            )));
            assert_eq!(
                vec![("START".to_string(), ChannelState::Control)],
                state_kinds(&events)
            );
        }
        events.borrow_mut().clear();

        // repeated aloha with the same site is idempotent
        state.receive(&Mpt1327Message::builder(MessageType::Alh).site("A1").build());
        assert!(!events.borrow().iter().any(|event| matches!(
            event,
            DecoderEvent::Attribute {
                attribute: ChangedAttribute::ChannelSiteNumber,
                ..
            }
        )));
        events.borrow_mut().clear();

        state.receive(
            &Mpt1327Message::builder(MessageType::Gtc)
                .from("100")
                .to("200")
                .channel(7)
                .build(),
        );

        assert!(state.idents().contains("100"));
        assert!(state.idents().contains("200"));
        assert_eq!(vec!["100".to_string()], state.groups()["200"]);

        let events = events.borrow();
        let allocation = events
            .iter()
            .find_map(|event| match event {
                DecoderEvent::State(DecoderStateEvent {
                    kind: StateEventKind::TrafficChannelAllocation(call),
                    ..
                }) => Some(call.clone()),
                _ => None,
            })
            .expect("expected traffic channel allocation");
        assert_eq!(CallEventKind::Call, allocation.kind());
        assert_eq!(Some("7"), allocation.channel());
        assert_eq!(154_875_000, allocation.frequency());

        // GTC does not also emit a control continuation
        assert_eq!(1, state_kinds(&events).len());
    }

    #[test]
    fn test_gtc_group_membership_has_no_duplicates() {
        let bus = DecoderStateBus::new();
        let mut state = standard_state(&bus);

        for _ in 0..3 {
            state.receive(
                &Mpt1327Message::builder(MessageType::Gtc)
                    .from("100")
                    .to("200")
                    .channel(7)
                    .build(),
            );
        }
        state.receive(
            &Mpt1327Message::builder(MessageType::Gtc)
                .from("101")
                .to("200")
                .channel(8)
                .build(),
        );

        assert_eq!(
            vec!["100".to_string(), "101".to_string()],
            state.groups()["200"]
        );
    }

    #[test]
    fn test_head_plus_sdm_has_no_channel() {
        let bus = DecoderStateBus::new();
        let events = collect(&bus);
        let mut state = standard_state(&bus);

        state.receive(
            &Mpt1327Message::builder(MessageType::HeadPlus2)
                .from("100")
                .to("200")
                .free_text("METER READ 42")
                .build(),
        );

        let events = events.borrow();
        let call = events
            .iter()
            .find_map(|event| match event {
                DecoderEvent::Call(call) => Some(call.clone()),
                _ => None,
            })
            .expect("expected SDM call event");
        assert_eq!(CallEventKind::Sdm, call.kind());
        assert_eq!(Some("METER READ 42"), call.details());
        assert_eq!(None, call.channel());
        assert_eq!(0, call.frequency());
    }

    // spec scenario: MAINT on a standard channel
    #[test]
    fn test_maint_on_standard_channel() {
        let bus = DecoderStateBus::new();
        let events = collect(&bus);
        let mut state = standard_state(&bus);

        state.receive(&Mpt1327Message::builder(MessageType::Maint).to("200").build());

        assert_eq!(Some("200"), state.to_talkgroup());

        let events = events.borrow();

        // order: timeout, call, metadata, start
        let timeout_at = events
            .iter()
            .position(|event| matches!(event, DecoderEvent::ChannelTimeout(_)))
            .expect("expected timeout event");
        let call_at = events
            .iter()
            .position(|event| matches!(event, DecoderEvent::Call(_)))
            .expect("expected call event");
        let metadata_at = events
            .iter()
            .position(|event| matches!(event, DecoderEvent::Metadata(_)))
            .expect("expected metadata");
        let start_at = events
            .iter()
            .position(|event| {
                matches!(
                    event,
                    DecoderEvent::State(DecoderStateEvent {
                        kind: StateEventKind::Start,
                        state: ChannelState::Call,
                        ..
                    })
                )
            })
            .expect("expected START/CALL");
        assert!(timeout_at < call_at && call_at < metadata_at && metadata_at < start_at);

        match &events[timeout_at] {
            DecoderEvent::ChannelTimeout(timeout) => {
                assert_eq!(ChannelType::Standard, timeout.channel_type);
                assert_eq!(30_000, timeout.timeout_ms);
            }
            _ => unreachable!(),
        }

        match &events[call_at] {
            DecoderEvent::Call(call) => {
                assert_eq!(CallEventKind::Call, call.kind());
                assert_eq!(Some("MONITORED TRAFFIC CHANNEL"), call.details());
                assert_eq!(Some("200"), call.to());
            }
            _ => unreachable!(),
        }

        match &events[metadata_at] {
            DecoderEvent::Metadata(metadata) => {
                assert_eq!(MetadataType::To, metadata.metadata_type);
                assert_eq!("200", metadata.value);
                assert!(metadata.live);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_maint_on_traffic_channel_is_ignored() {
        let bus = DecoderStateBus::new();
        let events = collect(&bus);
        let mut state =
            Mpt1327DecoderState::new(&bus, None, ChannelType::Traffic, 30_000);

        state.receive(&Mpt1327Message::builder(MessageType::Maint).to("200").build());
        assert!(events.borrow().is_empty());
        assert_eq!(None, state.to_talkgroup());
    }

    // spec scenario: CLEAR ends the call
    #[test]
    fn test_clear_ends_the_call() {
        let bus = DecoderStateBus::new();
        let events = collect(&bus);
        let mut state = standard_state(&bus);

        state.receive(&Mpt1327Message::builder(MessageType::Maint).to("200").build());
        events.borrow_mut().clear();

        state.receive(&Mpt1327Message::builder(MessageType::Clear).channel(7).build());

        assert_eq!(7, state.channel_number());
        assert_eq!(
            vec![("END".to_string(), ChannelState::Fade)],
            state_kinds(&events.borrow())
        );
    }

    // spec scenario: RESET on the event bus
    #[test]
    fn test_reset_event_ends_call_and_restores_timeout() {
        let bus = DecoderStateBus::new();
        let state = Rc::new(RefCell::new(standard_state(&bus)));
        Mpt1327DecoderState::attach(Rc::clone(&state));
        let events = collect(&bus);

        state.borrow_mut().receive(
            &Mpt1327Message::builder(MessageType::Acki)
                .from("100")
                .to("200")
                .build(),
        );
        state
            .borrow_mut()
            .receive(&Mpt1327Message::builder(MessageType::Maint).to("200").build());
        assert_eq!(Some("200"), state.borrow().to_talkgroup());
        events.borrow_mut().clear();

        // a peer (the host) requests a reset over the bus
        let host = bus.register_source();
        bus.broadcast(DecoderEvent::State(DecoderStateEvent::new(
            host,
            StateEventKind::Reset,
            ChannelState::Idle,
        )));

        assert_eq!(None, state.borrow().from_talkgroup());
        assert_eq!(None, state.borrow().to_talkgroup());
        // idents survive the soft reset
        assert!(!state.borrow().idents().is_empty());

        let events = events.borrow();
        assert!(events.iter().any(|event| matches!(
            event,
            DecoderEvent::Attribute {
                attribute: ChangedAttribute::FromTalkgroup,
                ..
            }
        )));
        assert!(events.iter().any(|event| matches!(
            event,
            DecoderEvent::Attribute {
                attribute: ChangedAttribute::ToTalkgroup,
                ..
            }
        )));
        assert!(events.iter().any(|event| matches!(
            event,
            DecoderEvent::ChannelTimeout(ChangeChannelTimeoutEvent {
                timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
                ..
            })
        )));
        // the monitored call was ended and re-broadcast
        assert!(events.iter().any(|event| matches!(
            event,
            DecoderEvent::Call(call) if call.is_ended()
        )));
    }

    #[test]
    fn test_hard_reset_clears_registries() {
        let bus = DecoderStateBus::new();
        let mut state = standard_state(&bus);

        state.receive(
            &Mpt1327Message::builder(MessageType::Gtc)
                .from("100")
                .to("200")
                .channel(7)
                .build(),
        );
        assert!(!state.idents().is_empty());
        assert!(!state.groups().is_empty());

        state.reset();
        assert!(state.idents().is_empty());
        assert!(state.groups().is_empty());
    }

    #[test]
    fn test_source_frequency_event() {
        let bus = DecoderStateBus::new();
        let state = Rc::new(RefCell::new(standard_state(&bus)));
        Mpt1327DecoderState::attach(Rc::clone(&state));

        let host = bus.register_source();
        bus.broadcast(DecoderEvent::State(DecoderStateEvent::new(
            host,
            StateEventKind::SourceFrequency(154_875_000),
            ChannelState::Idle,
        )));

        assert_eq!(154_875_000, state.borrow().frequency());
    }

    #[test]
    fn test_foreign_allocation_is_adopted() {
        let bus = DecoderStateBus::new();
        let state = Rc::new(RefCell::new(Mpt1327DecoderState::new(
            &bus,
            None,
            ChannelType::Traffic,
            30_000,
        )));
        Mpt1327DecoderState::attach(Rc::clone(&state));

        let peer = bus.register_source();
        let call = CallEvent::builder(CallEventKind::Call)
            .channel("7")
            .frequency(154_875_000)
            .from("100")
            .to("200")
            .build();
        bus.broadcast(DecoderEvent::State(DecoderStateEvent::new(
            peer,
            StateEventKind::TrafficChannelAllocation(call),
            ChannelState::Control,
        )));

        let state = state.borrow();
        assert_eq!(7, state.channel_number());
        assert_eq!(154_875_000, state.frequency());
        assert_eq!(Some("100"), state.from_talkgroup());
        assert_eq!(Some("200"), state.to_talkgroup());
    }

    #[test]
    fn test_unparseable_allocation_channel_is_ignored() {
        let bus = DecoderStateBus::new();
        let state = Rc::new(RefCell::new(Mpt1327DecoderState::new(
            &bus,
            None,
            ChannelType::Traffic,
            30_000,
        )));
        Mpt1327DecoderState::attach(Rc::clone(&state));

        let peer = bus.register_source();
        let call = CallEvent::builder(CallEventKind::Call)
            .channel("not-a-number")
            .frequency(460_000_000)
            .build();
        bus.broadcast(DecoderEvent::State(DecoderStateEvent::new(
            peer,
            StateEventKind::TrafficChannelAllocation(call),
            ChannelState::Control,
        )));

        let state = state.borrow();
        // the channel keeps its old number but still adopts the rest
        assert_eq!(0, state.channel_number());
        assert_eq!(460_000_000, state.frequency());
    }

    #[test]
    fn test_own_allocation_is_not_adopted() {
        let bus = DecoderStateBus::new();
        let state = Rc::new(RefCell::new(standard_state(&bus)));
        Mpt1327DecoderState::attach(Rc::clone(&state));

        state.borrow_mut().receive(
            &Mpt1327Message::builder(MessageType::Gtc)
                .from("100")
                .to("200")
                .channel(7)
                .build(),
        );

        // our own GTC broadcast must not loop back into adoption
        assert_eq!(None, state.borrow().from_talkgroup());
        assert_eq!(0, state.borrow().channel_number());
    }
}
