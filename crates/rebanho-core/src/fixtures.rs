//! Seed data shared by the unit tests.

use chrono::NaiveDate;

use crate::models::{Area, AreaId, GroupId, GroupState, Member, MemberId, Sector, SectorId, SmallGroup};
use crate::store::Store;

pub const FACILITATOR: MemberId = 100;
pub const HOST: MemberId = 101;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub struct Fixture {
    pub store: Store,
    pub area_id: AreaId,
    pub sector_id: SectorId,
    pub group_id: GroupId,
    pub facilitator: MemberId,
    pub host: MemberId,
    pub participants: Vec<MemberId>,
}

/// One area, one sector, one active group led by `FACILITATOR` and `HOST`,
/// with participants numbered `1..=participants`.
pub fn seed_single_group(participants: i64) -> Fixture {
    let store = Store::open_in_memory().unwrap();
    store.insert_member(&Member::new(FACILITATOR, "Paulo Facilitador")).unwrap();
    store.insert_member(&Member::new(HOST, "Lídia Anfitriã")).unwrap();
    store
        .insert_area(&Area {
            id: 1,
            name: "Centro".to_string(),
            supervisors: vec![],
        })
        .unwrap();
    store
        .insert_sector(&Sector {
            id: 1,
            name: "Setor Alfa".to_string(),
            area_id: 1,
            supervisors: vec![],
        })
        .unwrap();
    store
        .insert_group(&group(1, "PG Esperança", 1, FACILITATOR, HOST))
        .unwrap();

    let ids: Vec<MemberId> = (1..=participants).collect();
    for id in &ids {
        add_member(&store, *id, Some(1));
    }

    Fixture {
        store,
        area_id: 1,
        sector_id: 1,
        group_id: 1,
        facilitator: FACILITATOR,
        host: HOST,
        participants: ids,
    }
}

pub fn group(
    id: GroupId,
    name: &str,
    sector_id: SectorId,
    facilitator_id: MemberId,
    host_id: MemberId,
) -> SmallGroup {
    SmallGroup {
        id,
        name: name.to_string(),
        sector_id,
        facilitator_id,
        host_id,
        meeting_day: None,
        meeting_time: None,
        state: GroupState::Active,
    }
}

pub fn add_member(store: &Store, id: MemberId, group_id: Option<GroupId>) -> Member {
    let mut member = Member::new(id, format!("Membro {}", id));
    member.group_id = group_id;
    store.insert_member(&member).unwrap();
    member
}
