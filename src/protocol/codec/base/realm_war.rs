//! Siege engines and boats. Keeps and the war map start with 1.70, horses
//! with 1.80 and guild banners with 1.76; older clients get nothing.

use crate::core::buffer::PacketWriter;
use crate::error::Result;
use crate::protocol::codec::{mismatch, EncodeContext, Outbox};
use crate::protocol::message::{
    ItemData, OperationId as Op, OutboundMessage as Msg, SiegeAnimation, SiegeWeaponInterface,
};
use crate::protocol::opcodes::ServerPacket;

use super::group::write_item_168;

const FIRE_MARK: u8 = 0xAA;
const FIRE_TRAILER: u16 = 0xFFBF;
/// Fire animations aim slightly above the target's feet
const FIRE_Z_OFFSET: u32 = 50;

/// Encoders for operations an old client has no packet for
macro_rules! not_before {
    ($($name:ident => $op:ident),* $(,)?) => {$(
        pub(crate) fn $name(_: &EncodeContext<'_>, msg: &Msg, _: &mut Outbox<'_>) -> Result<()> {
            if msg.operation() != Op::$op {
                return Err(mismatch(Op::$op));
            }
            Ok(())
        }
    )*};
}

not_before! {
    keep_info => KeepInfo,
    keep_realm_update => KeepRealmUpdate,
    keep_remove => KeepRemove,
    keep_component_info => KeepComponentInfo,
    keep_component_detail_update => KeepComponentDetailUpdate,
    keep_claim => KeepClaim,
    keep_component_update => KeepComponentUpdate,
    keep_component_interact => KeepComponentInteract,
    keep_component_hook_point => KeepComponentHookPoint,
    clear_keep_component_hook_point => ClearKeepComponentHookPoint,
    hook_point_store => HookPointStore,
    warmap_update => WarmapUpdate,
    warmap_detail_update => WarmapDetailUpdate,
    warmap_bonuses => WarmapBonuses,
    set_controlled_horse => SetControlledHorse,
    controlled_horse => ControlledHorse,
    rvr_guild_banner => RvRGuildBanner,
}

pub(crate) fn moving_object_create(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::MovingObjectCreate(obj) = msg else {
        return Err(mismatch(Op::MovingObjectCreate));
    };
    let realm = if obj.realm == 3 {
        0x40
    } else {
        u16::from(obj.realm) << 4
    };
    let flag = u16::from(obj.object_type) | realm | u16::from(obj.level) << 9;

    let mut w = PacketWriter::new();
    w.write_u16(obj.object_id);
    w.write_u16(0);
    w.write_u16(obj.heading);
    w.write_u16(obj.z);
    w.write_u32(obj.x);
    w.write_u32(obj.y);
    w.write_u16(obj.model);
    w.write_u16(flag);
    w.write_u16(obj.emblem);
    w.write_u16(0);
    w.write_u32(0);
    w.write_pascal(&obj.name);
    w.write_u8(0);
    out.tcp(ServerPacket::MovingObjectCreate, w);
    Ok(())
}

/// Ammo the interface lists, at most one count byte's worth
pub(crate) fn listed_ammo(siege: &SiegeWeaponInterface) -> &[(u8, ItemData)] {
    &siege.ammo[..siege.ammo.len().min(u8::MAX as usize)]
}

/// `"name (state)"` as shown in the interface title
pub(crate) fn siege_title(siege: &SiegeWeaponInterface) -> String {
    format!("{} ({})", siege.name, siege.state)
}

/// Movable bit with the ammo type in the high byte
#[inline]
pub(crate) fn siege_flag(siege: &SiegeWeaponInterface) -> u16 {
    u16::from(siege.movable) | u16::from(siege.ammo_type) << 8
}

pub(crate) fn write_siege_ammo(w: &mut PacketWriter, ammo: &[(u8, ItemData)]) {
    for (slot, item) in ammo {
        w.write_u8(*slot);
        write_item_168(w, Some(item));
    }
}

pub(crate) fn siege_weapon_interface(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::SiegeWeaponInterface(siege) = msg else {
        return Err(mismatch(Op::SiegeWeaponInterface));
    };
    let ammo = listed_ammo(siege);

    let mut w = PacketWriter::new();
    w.write_u16(siege_flag(siege));
    w.write_u8(0);
    w.write_u8(0);
    w.write_u8((siege.time / 10) as u8);
    w.write_u8(ammo.len() as u8);
    w.write_u8(siege.action);
    w.write_u8(siege.ammo_slot);
    w.write_u16(siege.effect);
    w.write_u16(siege.time);
    w.write_u32(u32::from(siege.object_id));
    w.write_pascal(&siege_title(siege));
    write_siege_ammo(&mut w, ammo);
    out.tcp_checked(ServerPacket::SiegeWeaponInterface, w)
}

pub(crate) fn siege_weapon_close_interface(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::SiegeWeaponCloseInterface = msg else {
        return Err(mismatch(Op::SiegeWeaponCloseInterface));
    };
    let mut w = PacketWriter::new();
    w.write_u16(0);
    w.write_u16(1);
    w.fill(0x00, 13);
    out.tcp(ServerPacket::SiegeWeaponInterface, w);
    Ok(())
}

fn write_siege_target(w: &mut PacketWriter, anim: &SiegeAnimation, z: u32) {
    w.write_u32(u32::from(anim.object_id));
    w.write_u32(anim.x);
    w.write_u32(anim.y);
    w.write_u32(z);
    w.write_u32(u32::from(anim.target));
    w.write_u16(anim.effect);
    w.write_u16((anim.timer / 100).min(u32::from(u16::MAX)) as u16);
    w.write_u8(anim.action);
}

pub(crate) fn siege_weapon_animation(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::SiegeWeaponAnimation(anim) = msg else {
        return Err(mismatch(Op::SiegeWeaponAnimation));
    };
    let mut w = PacketWriter::new();
    write_siege_target(&mut w, anim, anim.z);
    w.fill(0x00, 3);
    out.tcp(ServerPacket::SiegeWeaponAnimation, w);
    Ok(())
}

pub(crate) fn siege_weapon_fire_animation(
    _: &EncodeContext<'_>,
    msg: &Msg,
    out: &mut Outbox<'_>,
) -> Result<()> {
    let Msg::SiegeWeaponFireAnimation(anim) = msg else {
        return Err(mismatch(Op::SiegeWeaponFireAnimation));
    };
    // a shot without a target object lands nowhere
    let aimed = if anim.target == 0 {
        SiegeAnimation {
            x: 0,
            y: 0,
            z: 0,
            ..*anim
        }
    } else {
        SiegeAnimation {
            z: anim.z.saturating_add(FIRE_Z_OFFSET),
            ..*anim
        }
    };
    let mut w = PacketWriter::new();
    write_siege_target(&mut w, &aimed, aimed.z);
    w.write_u8(FIRE_MARK);
    w.write_u16(FIRE_TRAILER);
    out.tcp(ServerPacket::SiegeWeaponAnimation, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::protocol::codec::testing::encode_at;
    use crate::protocol::message::{KeepInfo, MovingObject};
    use crate::protocol::version::ProtocolVersion;

    #[test]
    fn test_keeps_unknown_to_old_clients() {
        let msg = Msg::KeepInfo(KeepInfo::default());
        assert!(encode_at(ProtocolVersion::V168, &msg).is_empty());
    }

    #[test]
    fn test_moving_object_flag() {
        let obj = MovingObject {
            object_id: 9,
            object_type: 2,
            realm: 3,
            level: 1,
            name: "Boat".into(),
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V168, &Msg::MovingObjectCreate(obj));
        let p = &packets[0].payload;
        // type 2, hibernia 0x40, level 1 << 9
        assert_eq!(&p[18..20], &[0x02, 0x42]);
        assert!(p.ends_with(b"\x04Boat\x00"));
    }

    #[test]
    fn test_siege_interface_lists_ammo() {
        let siege = SiegeWeaponInterface {
            object_id: 0x0102,
            movable: true,
            ammo_type: 1,
            time: 35,
            name: "Ram".into(),
            state: "aiming".into(),
            ammo: vec![(3, ItemData::default())],
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V168, &Msg::SiegeWeaponInterface(siege));
        let p = &packets[0].payload;
        assert_eq!(&p[..6], &[1, 1, 0, 0, 3, 1]);
        assert_eq!(&p[12..16], &[0, 0, 1, 2]);
        assert_eq!(&p[16..29], b"\x0cRam (aiming)");
        assert_eq!(p[29], 3);
        assert_eq!(p.len(), 30 + 18);
    }

    #[test]
    fn test_fire_without_target() {
        let anim = SiegeAnimation {
            object_id: 1,
            x: 500,
            z: 10,
            timer: 2500,
            ..Default::default()
        };
        let packets = encode_at(ProtocolVersion::V168, &Msg::SiegeWeaponFireAnimation(anim));
        let p = &packets[0].payload;
        assert_eq!(&p[4..16], &[0; 12]);
        assert_eq!(&p[22..24], &[0, 25]);
        assert!(p.ends_with(&[0xAA, 0xFF, 0xBF]));
    }
}
