// Copyright (c) 2024 Jake Swensen
// SPDX-License-Identifier: MPL-2.0
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::register_offset;

/// Control-loop update interval, CONFIG1 bits 7:5.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateTime {
    Ms100 = 0b000,
    Ms200 = 0b001,
    Ms300 = 0b010,
    Ms400 = 0b011,
    Ms500 = 0b100,
    Ms800 = 0b101,
    Ms1200 = 0b110,
    Ms1600 = 0b111,
}

impl UpdateTime {
    /// Map a millisecond value onto the discrete field. Unmapped values fall
    /// back to the 200 ms factory default.
    pub fn from_ms(ms: u16) -> Self {
        match ms {
            100 => UpdateTime::Ms100,
            200 => UpdateTime::Ms200,
            300 => UpdateTime::Ms300,
            400 => UpdateTime::Ms400,
            500 => UpdateTime::Ms500,
            800 => UpdateTime::Ms800,
            1200 => UpdateTime::Ms1200,
            1600 => UpdateTime::Ms1600,
            _ => UpdateTime::Ms200,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0b000 => UpdateTime::Ms100,
            0b001 => UpdateTime::Ms200,
            0b010 => UpdateTime::Ms300,
            0b011 => UpdateTime::Ms400,
            0b100 => UpdateTime::Ms500,
            0b101 => UpdateTime::Ms800,
            0b110 => UpdateTime::Ms1200,
            _ => UpdateTime::Ms1600,
        }
    }

    pub fn as_ms(self) -> u16 {
        match self {
            UpdateTime::Ms100 => 100,
            UpdateTime::Ms200 => 200,
            UpdateTime::Ms300 => 300,
            UpdateTime::Ms400 => 400,
            UpdateTime::Ms500 => 500,
            UpdateTime::Ms800 => 800,
            UpdateTime::Ms1200 => 1200,
            UpdateTime::Ms1600 => 1600,
        }
    }
}

/// Tachometer edges sampled per revolution, CONFIG1 bits 4:3.
///
/// An n-edge fan has (n-1)/2 poles; the common 2-pole fan produces 5 edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TachEdges {
    Edges3 = 0b00,
    Edges5 = 0b01,
    Edges7 = 0b10,
    Edges9 = 0b11,
}

impl TachEdges {
    /// Map an edge count onto the field. Unmapped values fall back to the
    /// 5-edge (2-pole) default.
    pub fn from_edge_count(edges: u8) -> Self {
        match edges {
            3 => TachEdges::Edges3,
            5 => TachEdges::Edges5,
            7 => TachEdges::Edges7,
            9 => TachEdges::Edges9,
            _ => TachEdges::Edges5,
        }
    }

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => TachEdges::Edges3,
            0b01 => TachEdges::Edges5,
            0b10 => TachEdges::Edges7,
            _ => TachEdges::Edges9,
        }
    }

    pub fn edge_count(self) -> u8 {
        match self {
            TachEdges::Edges3 => 3,
            TachEdges::Edges5 => 5,
            TachEdges::Edges7 => 7,
            TachEdges::Edges9 => 9,
        }
    }

    pub fn poles(self) -> u8 {
        (self.edge_count() - 1) / 2
    }
}

bitfield::bitfield! {
    /// Fan Configuration 1: update rate, tachometer edges and the speed
    /// control algorithm enables.
    #[derive(Clone, Copy)]
    pub struct FanConfiguration1(u8);
    impl Debug;

    /// UDT: control-loop update interval bits.
    pub udtx_bits, set_udtx_bits: 7, 5;

    /// EDG: tachometer edge count bits.
    pub edgx_bits, set_edgx_bits: 4, 3;

    /// EN_ALGO: enables the closed-loop fan speed control algorithm.
    pub enagx, set_enagx: 2;

    /// EN_RRC: enables ramp rate control.
    pub rrcx, set_rrcx: 1;

    /// CLR: clears the accumulated control-loop error when written.
    pub clrx, set_clrx: 0;
}

impl FanConfiguration1 {
    pub fn udtx(&self) -> UpdateTime {
        UpdateTime::from_bits(self.udtx_bits())
    }

    pub fn set_udtx(&mut self, value: UpdateTime) {
        self.set_udtx_bits(value as u8);
    }

    pub fn edgx(&self) -> TachEdges {
        TachEdges::from_bits(self.edgx_bits())
    }

    pub fn set_edgx(&mut self, value: TachEdges) {
        self.set_edgx_bits(value as u8);
    }
}

register_offset!(FanConfiguration1, offset = 0x02, default = 0x28);
