//! Cadence sources for the registry scripts and admin transactions
//!
//! Imports use `0xContractName` placeholders, resolved against the
//! configured contract aliases before sending.

pub const GET_ALL_HOTSPOTS: &str = r#"
import HotspotRegistry from 0xHotspotRegistry

access(all) fun main(): [HotspotRegistry.Hotspot] {
    return HotspotRegistry.getAllHotspots()
}
"#;

pub const GET_OPERATOR_NFTS: &str = r#"
import HotspotOperatorNFT from 0xHotspotOperatorNFT
import NonFungibleToken from 0xNonFungibleToken

access(all) fun main(address: Address): [&HotspotOperatorNFT.NFT] {
    let account = getAccount(address)

    if let collectionRef = account.capabilities.borrow<&{HotspotOperatorNFT.HotspotOperatorNFTCollectionPublic}>(HotspotOperatorNFT.CollectionPublicPath) {
        var collection: [&HotspotOperatorNFT.NFT] = []
        for id in collectionRef.getIDs() {
            collection.append(collectionRef.borrowHotspotOperator(id: id)!)
        }
        return collection
    }

    return []
}
"#;

pub const OWNS_OPERATOR_NFT: &str = r#"
import HotspotOperatorNFT from 0xHotspotOperatorNFT

access(all) fun main(address: Address): Bool {
    let account = getAccount(address)

    if let collectionRef = account.capabilities.borrow<&{HotspotOperatorNFT.HotspotOperatorNFTCollectionPublic}>(HotspotOperatorNFT.CollectionPublicPath) {
        return collectionRef.getIDs().length > 0
    }

    return false
}
"#;

pub const UPDATE_HOTSPOT_LOCATION: &str = r#"
import HotspotRegistry from 0xHotspotRegistry

transaction(nftID: UInt64, lat: UFix64, lng: UFix64) {
    prepare(acct: auth(Storage) &Account) {
        let adminRef = acct.storage.borrow<&HotspotRegistry.Admin>(from: HotspotRegistry.AdminStoragePath)
            ?? panic("Could not borrow Admin reference")

        adminRef.updateHotspotLocation(id: nftID, lat: lat, lng: lng)
    }
}
"#;

/// Variant for registries whose `updateHotspotLocation` takes `lng: Fix64`.
/// The stock registry takes `UFix64` and fails type checking on this one.
pub const UPDATE_HOTSPOT_LOCATION_SIGNED: &str = r#"
import HotspotRegistry from 0xHotspotRegistry

transaction(nftID: UInt64, lat: UFix64, lng: Fix64) {
    prepare(acct: auth(Storage) &Account) {
        let adminRef = acct.storage.borrow<&HotspotRegistry.Admin>(from: HotspotRegistry.AdminStoragePath)
            ?? panic("Could not borrow Admin reference")

        adminRef.updateHotspotLocation(id: nftID, lat: lat, lng: lng)
    }
}
"#;

pub const UPDATE_HOTSPOT_STATUS: &str = r#"
import HotspotRegistry from 0xHotspotRegistry

transaction(nftID: UInt64, online: Bool) {
    prepare(acct: auth(Storage) &Account) {
        let adminRef = acct.storage.borrow<&HotspotRegistry.Admin>(from: HotspotRegistry.AdminStoragePath)
            ?? panic("Could not borrow Admin reference")

        adminRef.updateHotspotStatus(id: nftID, online: online)
    }
}
"#;

pub const ADD_ADMIN_KEYS: &str = r#"
transaction(publicKeyHex: String, numOfKeys: Int) {
    prepare(signer: auth(Keys, AddKey) &Account) {
        let key = PublicKey(
            publicKey: publicKeyHex.decodeHex(),
            signatureAlgorithm: SignatureAlgorithm.ECDSA_P256
        )

        var i = 0
        while i < numOfKeys {
            signer.keys.add(
                publicKey: key,
                hashAlgorithm: HashAlgorithm.SHA3_256,
                weight: 1000.0
            )
            i = i + 1
        }
    }
}
"#;

pub const PROBE: &str = r#"
transaction() {
    prepare(acct: auth(Storage) &Account) {}
}
"#;
