//! Bidirectional expansion of single-end-point commands.

use crate::command::{
    CollectionCommandKind, CollectionEndPointCommand, ExpandedCommand, ObjectCommandKind,
    ObjectEndPointCommand, RelationEndPointCommand, RelationEndPointTouchCommand,
};
use crate::end_point::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;

impl ObjectEndPointCommand {
    /// Adds the commands keeping the opposite side of the relation in step.
    ///
    /// - set-same touches the opposite end point of the related object,
    /// - 1:1 sets link the new related object, unlink the old one and unlink
    ///   the new related object's previous partner,
    /// - 1:many sets add the object to the new collection and remove it from
    ///   the old one.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotSupported`] for delete commands, which are
    /// composed by the transaction's object deletion instead.
    pub fn expand_to_all_related_objects(
        self,
        transaction: &mut ClientTransaction,
    ) -> CoreResult<ExpandedCommand> {
        let domain_object = self.domain_object().clone();
        let property = self.modified_end_point_id().property_name().to_string();
        let old = self.old_related_object().cloned();
        let new = self.new_related_object().cloned();
        let opposite_property = opposite_property(transaction, self.modified_end_point_id())?;
        let mut related: Vec<RelationEndPointCommand> = Vec::new();

        match self.kind() {
            ObjectCommandKind::SetSame => {
                if let (Some(new), Some(opposite_property)) = (&new, &opposite_property) {
                    related.push(
                        RelationEndPointTouchCommand::new(RelationEndPointId::new(
                            new.clone(),
                            opposite_property.as_str(),
                        ))
                        .into(),
                    );
                }
            }
            ObjectCommandKind::SetUnidirectional => {}
            ObjectCommandKind::SetOneOne => {
                let opposite_property = required_opposite(opposite_property, &self)?;
                if let Some(new) = &new {
                    let new_opposite = RelationEndPointId::new(new.clone(), opposite_property.as_str());
                    let previous_partner = transaction.opposite_object_id(&new_opposite)?;
                    related.push(
                        transaction
                            .create_set_command(&new_opposite, Some(&domain_object))?
                            .into(),
                    );
                    if let Some(partner) = previous_partner.filter(|partner| partner != &domain_object) {
                        let partner_end_point = RelationEndPointId::new(partner, property.as_str());
                        related.push(transaction.create_set_command(&partner_end_point, None)?.into());
                    }
                }
                if let Some(old) = &old {
                    let old_opposite = RelationEndPointId::new(old.clone(), opposite_property.as_str());
                    related.push(transaction.create_set_command(&old_opposite, None)?.into());
                }
            }
            ObjectCommandKind::SetOneMany => {
                let opposite_property = required_opposite(opposite_property, &self)?;
                if let Some(new) = &new {
                    let collection = RelationEndPointId::new(new.clone(), opposite_property.as_str());
                    related.push(
                        transaction
                            .create_add_command(&collection, domain_object.clone())?
                            .into(),
                    );
                }
                if let Some(old) = &old {
                    let collection = RelationEndPointId::new(old.clone(), opposite_property.as_str());
                    related.push(
                        transaction
                            .create_remove_command(&collection, &domain_object)?
                            .into(),
                    );
                }
            }
            ObjectCommandKind::Delete => {
                return Err(CoreError::not_supported(format!(
                    "the delete command of '{}' cannot be expanded; delete the object instead",
                    self.modified_end_point_id()
                )));
            }
        }

        Ok(ExpandedCommand::new(self.into(), related))
    }
}

impl CollectionEndPointCommand {
    /// Adds the commands keeping the foreign keys of the affected objects in step.
    ///
    /// Inserted objects point at the collection owner and leave their
    /// previous collection; removed objects point at nothing.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotSupported`] for delete commands.
    pub fn expand_to_all_related_objects(
        self,
        transaction: &mut ClientTransaction,
    ) -> CoreResult<ExpandedCommand> {
        let owner = self.domain_object().clone();
        let collection_property = self.modified_end_point_id().property_name().to_string();
        let real_property = opposite_property(transaction, self.modified_end_point_id())?
            .ok_or_else(|| {
                CoreError::mapping(format!(
                    "collection end point '{}' has no navigable opposite",
                    self.modified_end_point_id()
                ))
            })?;
        let link = Link {
            owner: &owner,
            collection_property: &collection_property,
            real_property: &real_property,
        };
        let mut related: Vec<RelationEndPointCommand> = Vec::new();

        match self.kind() {
            CollectionCommandKind::Insert { .. } => {
                if let Some(inserted) = self.new_related_object() {
                    link.attach(transaction, inserted, &mut related)?;
                }
            }
            CollectionCommandKind::Remove { .. } => {
                if let Some(removed) = self.old_related_object() {
                    link.detach(transaction, removed, &mut related)?;
                }
            }
            CollectionCommandKind::Replace { .. } => {
                if let Some(removed) = self.old_related_object() {
                    link.detach(transaction, removed, &mut related)?;
                }
                if let Some(inserted) = self.new_related_object() {
                    link.attach(transaction, inserted, &mut related)?;
                }
            }
            CollectionCommandKind::ReplaceSame { .. } => {
                if let Some(replaced) = self.old_related_object() {
                    related.push(
                        RelationEndPointTouchCommand::new(RelationEndPointId::new(
                            replaced.clone(),
                            real_property.as_str(),
                        ))
                        .into(),
                    );
                }
            }
            CollectionCommandKind::SetCollection {
                old_items,
                new_items,
            } => {
                for removed in old_items.iter().filter(|item| !new_items.contains(item)) {
                    link.detach(transaction, removed, &mut related)?;
                }
                for inserted in new_items.iter().filter(|item| !old_items.contains(item)) {
                    link.attach(transaction, inserted, &mut related)?;
                }
            }
            CollectionCommandKind::Delete { .. } => {
                return Err(CoreError::not_supported(format!(
                    "the delete command of '{}' cannot be expanded; delete the object instead",
                    self.modified_end_point_id()
                )));
            }
        }

        Ok(ExpandedCommand::new(self.into(), related))
    }
}

/// The relation between a collection owner and the objects in its collection.
struct Link<'a> {
    owner: &'a ObjectId,
    collection_property: &'a str,
    real_property: &'a str,
}

impl Link<'_> {
    fn attach(
        &self,
        transaction: &mut ClientTransaction,
        object_id: &ObjectId,
        related: &mut Vec<RelationEndPointCommand>,
    ) -> CoreResult<()> {
        let real = RelationEndPointId::new(object_id.clone(), self.real_property);
        let previous_owner = transaction.opposite_object_id(&real)?;
        related.push(
            transaction
                .create_set_command(&real, Some(self.owner))?
                .into(),
        );
        if let Some(previous_owner) = previous_owner.filter(|previous| previous != self.owner) {
            let previous_collection =
                RelationEndPointId::new(previous_owner, self.collection_property);
            related.push(
                transaction
                    .create_remove_command(&previous_collection, object_id)?
                    .into(),
            );
        }
        Ok(())
    }

    fn detach(
        &self,
        transaction: &mut ClientTransaction,
        object_id: &ObjectId,
        related: &mut Vec<RelationEndPointCommand>,
    ) -> CoreResult<()> {
        let real = RelationEndPointId::new(object_id.clone(), self.real_property);
        related.push(transaction.create_set_command(&real, None)?.into());
        Ok(())
    }
}

fn opposite_property(
    transaction: &ClientTransaction,
    end_point_id: &RelationEndPointId,
) -> CoreResult<Option<String>> {
    let definition = transaction.definition_of(end_point_id)?;
    let opposite = transaction
        .mapping()
        .opposite_end_point_definition(&definition)?;
    Ok(opposite.property_name().map(str::to_string))
}

fn required_opposite(
    opposite_property: Option<String>,
    command: &ObjectEndPointCommand,
) -> CoreResult<String> {
    opposite_property.ok_or_else(|| {
        CoreError::mapping(format!(
            "end point '{}' has no navigable opposite",
            command.modified_end_point_id()
        ))
    })
}
