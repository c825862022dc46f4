// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Pure calculation engine. Nothing in here touches the database, the
//! network or the clock; callers pass `today` in.

pub mod budget;
pub mod currency;
pub mod import;
pub mod kpi;
pub mod proposal;
pub mod rules;
