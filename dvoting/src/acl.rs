use crate::*;
use lazy_static::lazy_static;

lazy_static! {
    /// Well-known key of the global admin list: SHA256("AdminListId")
    pub static ref ADMIN_LIST_KEY: [u8; 32] = sha256(b"AdminListId");
}

/// Users with global admin privilege
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AdminList {
    #[serde(rename = "AdminList")]
    pub admins: Vec<String>,
}

impl AdminList {
    /// Read the admin list, empty before the first admin is added
    pub fn load(snapshot: &dyn Snapshot) -> Result<Self, Error> {
        match snapshot.get(&ADMIN_LIST_KEY[..])? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(AdminList::default()),
        }
    }

    pub fn store(&self, snapshot: &mut dyn Snapshot) -> Result<(), Error> {
        snapshot.set(&ADMIN_LIST_KEY[..], serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn index_of(&self, user_id: &str) -> Option<usize> {
        self.admins.iter().position(|a| a == user_id)
    }

    pub fn add(&mut self, user_id: &str) -> Result<(), Error> {
        if self.index_of(user_id).is_some() {
            return Err(Error::DuplicateUser(user_id.to_owned()));
        }
        self.admins.push(user_id.to_owned());
        Ok(())
    }

    /// Remove an admin. The last admin can never be removed.
    pub fn remove(&mut self, user_id: &str) -> Result<(), Error> {
        let index = self
            .index_of(user_id)
            .ok_or_else(|| Error::UnknownUser(user_id.to_owned()))?;
        if self.admins.len() == 1 {
            return Err(Error::LastAdmin);
        }
        self.admins.remove(index);
        Ok(())
    }
}

/// Require `user_id` to be an owner of the form or a global admin
pub fn require_form_admin(snapshot: &dyn Snapshot, form: &Form, user_id: &str) -> Result<(), Error> {
    if form.owner_index(user_id).is_some() {
        return Ok(());
    }
    if AdminList::load(snapshot)?.index_of(user_id).is_some() {
        return Ok(());
    }
    Err(Error::NotOwner(user_id.to_owned()))
}

pub(crate) fn add_admin(ctx: &mut Context, tx: AdminChange) -> Result<(), Error> {
    let mut list = AdminList::load(ctx.snapshot())?;

    // Anyone may add the first admin
    if !list.admins.is_empty() && list.index_of(&tx.performer).is_none() {
        return Err(Error::NotAdmin(tx.performer));
    }

    list.add(&tx.target)?;
    list.store(ctx.snapshot_mut())
}

pub(crate) fn remove_admin(ctx: &mut Context, tx: AdminChange) -> Result<(), Error> {
    let mut list = AdminList::load(ctx.snapshot())?;

    if list.index_of(&tx.performer).is_none() {
        return Err(Error::NotAdmin(tx.performer));
    }

    list.remove(&tx.target)?;
    list.store(ctx.snapshot_mut())
}

/// Load a form and check the performer may manage its users
fn form_for_user_change(ctx: &Context, tx: &FormUserChange) -> Result<Form, Error> {
    let form = ctx.load_form(&tx.form_id)?;
    form.require_not_terminal()?;
    require_form_admin(ctx.snapshot(), &form, &tx.performer)?;
    Ok(form)
}

pub(crate) fn add_owner(ctx: &mut Context, tx: FormUserChange) -> Result<(), Error> {
    let mut form = form_for_user_change(ctx, &tx)?;

    if form.owner_index(&tx.target).is_some() {
        return Err(Error::DuplicateUser(tx.target));
    }
    form.owners.push(tx.target);

    ctx.save_form(&form)
}

pub(crate) fn remove_owner(ctx: &mut Context, tx: FormUserChange) -> Result<(), Error> {
    let mut form = form_for_user_change(ctx, &tx)?;

    let index = form
        .owner_index(&tx.target)
        .ok_or_else(|| Error::UnknownUser(tx.target.clone()))?;
    if form.owners.len() == 1 {
        return Err(Error::LastOwner);
    }
    form.owners.remove(index);

    ctx.save_form(&form)
}

pub(crate) fn add_voter(ctx: &mut Context, tx: FormUserChange) -> Result<(), Error> {
    let mut form = form_for_user_change(ctx, &tx)?;

    if form.voter_index(&tx.target).is_some() {
        return Err(Error::DuplicateUser(tx.target));
    }
    form.voters.push(tx.target);

    ctx.save_form(&form)
}

pub(crate) fn remove_voter(ctx: &mut Context, tx: FormUserChange) -> Result<(), Error> {
    let mut form = form_for_user_change(ctx, &tx)?;

    let index = form
        .voter_index(&tx.target)
        .ok_or_else(|| Error::UnknownUser(tx.target.clone()))?;
    form.voters.remove(index);

    ctx.save_form(&form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_list() {
        let mut snapshot = MemSnapshot::default();
        let mut list = AdminList::load(&snapshot).unwrap();
        assert_eq!(list.index_of("x"), None);

        list.add("x").unwrap();
        assert!(matches!(list.add("x"), Err(Error::DuplicateUser(_))));
        assert!(matches!(list.remove("x"), Err(Error::LastAdmin)));

        list.add("y").unwrap();
        list.store(&mut snapshot).unwrap();

        let raw = snapshot.get(&ADMIN_LIST_KEY[..]).unwrap().unwrap();
        assert_eq!(raw, br#"{"AdminList":["x","y"]}"#.to_vec());

        let mut list = AdminList::load(&snapshot).unwrap();
        assert_eq!(list.index_of("y"), Some(1));
        list.remove("x").unwrap();
        assert!(matches!(list.remove("z"), Err(Error::UnknownUser(_))));

        let err = list.remove("y").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot remove this Admin because it is the only one remaining"
        );
    }
}
